use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use tokio::{sync::mpsc, time::timeout};
use uuid::Uuid;

use trivia_live_back::{
    config::AppConfig,
    dao::{
        catalog_store::memory::MemoryCatalogStore,
        models::{CatalogEntity, QuestionEntity},
    },
    dto::ws::{ClientMessage, ServerMessage},
    services::{scoring::MAX_POINTS, session_service},
    state::{
        AppState, ClientConnection, SharedState,
        game::{Difficulty, Provenance},
    },
};

struct TestClient {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl TestClient {
    fn connect(state: &SharedState) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        state
            .connections()
            .insert(id, ClientConnection { id, tx });
        Self { id, rx }
    }

    fn send(&self, state: &SharedState, frame: &str) {
        let command = ClientMessage::parse_command(frame).expect("valid frame");
        assert!(state.session().client(self.id, command));
    }

    /// Skip frames until one carrying `event` arrives.
    async fn expect(&mut self, event: &str) -> ServerMessage {
        loop {
            let frame = timeout(Duration::from_secs(120), self.rx.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {event}"))
                .expect("connection feed closed");
            let Message::Text(text) = frame else {
                continue;
            };
            let message: ServerMessage = serde_json::from_str(text.as_str()).expect("server frame");
            if message.event_name() == event {
                return message;
            }
        }
    }
}

fn question(text: &str) -> QuestionEntity {
    QuestionEntity {
        text: text.into(),
        options: vec![
            "right".into(),
            "wrong one".into(),
            "wrong two".into(),
            "wrong three".into(),
        ],
        answer: 0,
        category: "science".into(),
        difficulty: Difficulty::Medium,
        source: Provenance::Curated,
        created_at: None,
    }
}

async fn running_session(with_store: bool) -> SharedState {
    let (state, inbox) = AppState::new(AppConfig::default());
    if with_store {
        let catalog = CatalogEntity {
            questions: vec![
                question("What is the chemical symbol of gold?"),
                question("How many planets orbit the Sun?"),
            ],
            categories: vec!["science".into()],
        };
        state
            .install_catalog_store(Arc::new(MemoryCatalogStore::new(catalog)))
            .await;
    }
    tokio::spawn(session_service::run(state.clone(), inbox));
    state
}

const START: &str =
    r#"{"event":"host:start","data":{"questionTimeMs":5000,"questionCount":2,"category":"science"}}"#;

#[tokio::test(start_paused = true)]
async fn game_runs_from_start_to_leaderboard() {
    let state = running_session(true).await;

    let mut host = TestClient::connect(&state);
    host.send(&state, r#"{"event":"join","data":{"role":"host"}}"#);
    host.expect("lobby").await;

    let mut player = TestClient::connect(&state);
    player.send(&state, r#"{"event":"join","data":{"role":"player","name":"Ana"}}"#);
    let ServerMessage::PlayerJoined(joined) = player.expect("player:joined").await else {
        unreachable!()
    };
    assert_eq!(joined.name, "Ana");

    host.send(&state, START);
    let ServerMessage::Question(first) = player.expect("question").await else {
        unreachable!()
    };
    assert_eq!((first.index, first.total, first.duration_ms), (0, 2, 5_000));
    assert!(!first.revealed);
    let right = first
        .options
        .iter()
        .position(|option| option == "right")
        .expect("correct option on screen");

    player.send(&state, &format!(r#"{{"event":"player:answer","data":{right}}}"#));
    let ServerMessage::HostAnswers(counts) = host.expect("host:answers").await else {
        unreachable!()
    };
    assert_eq!(counts.counts[right], 1);
    assert_eq!(counts.counts.iter().sum::<u32>(), 1);

    let ServerMessage::Reveal(reveal) = player.expect("reveal").await else {
        unreachable!()
    };
    assert_eq!(reveal.correct, right);
    let ServerMessage::Lobby(lobby) = player.expect("lobby").await else {
        unreachable!()
    };
    assert_eq!(lobby.players[0].correct_count, 1);
    assert!(lobby.players[0].score > 0 && lobby.players[0].score <= MAX_POINTS);
    let first_score = lobby.players[0].score;

    let ServerMessage::Question(second) = player.expect("question").await else {
        unreachable!()
    };
    assert_eq!(second.index, 1);

    player.expect("reveal").await;
    let ServerMessage::End(end) = player.expect("end").await else {
        unreachable!()
    };
    assert_eq!(end.leaderboard.len(), 1);
    assert_eq!(end.leaderboard[0].name, "Ana");
    assert_eq!(end.leaderboard[0].score, first_score);
    assert_eq!(end.leaderboard[0].correct_count, 1);

    let ServerMessage::Lobby(after) = player.expect("lobby").await else {
        unreachable!()
    };
    assert!(!after.started);
}

#[tokio::test(start_paused = true)]
async fn game_keeps_running_after_host_leaves() {
    let state = running_session(true).await;

    let mut host = TestClient::connect(&state);
    host.send(&state, r#"{"event":"join","data":{"role":"host"}}"#);
    host.expect("lobby").await;
    let mut player = TestClient::connect(&state);
    player.send(&state, r#"{"event":"join","data":{"role":"player","name":"Bo"}}"#);
    player.expect("player:joined").await;

    host.send(&state, START);
    player.expect("question").await;

    state.connections().remove(&host.id);
    assert!(state.session().disconnected(host.id));

    let ServerMessage::End(end) = player.expect("end").await else {
        unreachable!()
    };
    assert_eq!(end.leaderboard[0].name, "Bo");
    assert_eq!(end.leaderboard[0].score, 0);
}

#[tokio::test(start_paused = true)]
async fn start_without_storage_reports_to_host() {
    let state = running_session(false).await;

    let mut host = TestClient::connect(&state);
    host.send(&state, r#"{"event":"join","data":{"role":"host"}}"#);
    host.expect("lobby").await;

    host.send(&state, START);
    let ServerMessage::Error(error) = host.expect("error").await else {
        unreachable!()
    };
    assert!(!error.message.is_empty());
}
