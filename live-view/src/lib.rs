use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use game_core::{
    derive_events, project_host, project_spectator, project_summary, swap_mode_active, GameEvent,
    GameSnapshot, GiftId, HostSelection, HostView, SpectatorSelection, SpectatorView, SummaryView,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub mod client_state;
pub mod config;
pub mod effects;
pub mod error;
pub mod narration;
pub mod narrator;
pub mod overlay;
pub mod poller;
pub mod store;
pub mod upstream;

use client_state::{ClientStore, HostSession};
use config::Config;
use effects::{EffectPort, EffectTrigger, LogEffects};
use error::ClientError;
use narration::{LogSpeech, NarrationScheduler, NarrationStatus, ProcessSpeech, SpeechPort};
use narrator::Narrator;
use overlay::{OverlayCoordinator, OverlayKind, OverlayView};
use poller::PollHandle;
use store::SnapshotStore;
use upstream::{Credentials, GameApi, HostCommand, HttpGameApi};

/// External capabilities, injected so tests can swap in fakes.
#[derive(Clone)]
pub struct Ports {
    pub api: Arc<dyn GameApi>,
    pub speech: Arc<dyn SpeechPort>,
    pub effects: Arc<dyn EffectPort>,
}

/// Host-only presentation state.
struct HostConsole {
    narrator: Narrator,
    banner: Option<String>,
    spotlight: Option<GiftId>,
}

#[derive(Clone)]
pub struct AppState {
    api: Arc<dyn GameApi>,
    snapshots: Arc<RwLock<SnapshotStore>>,
    poll_error: Arc<RwLock<Option<String>>>,
    client: Arc<RwLock<ClientStore>>,
    console: Arc<Mutex<HostConsole>>,
    effects: EffectTrigger,
    overlay: OverlayCoordinator,
}

impl AppState {
    pub fn new(ports: Ports, client: ClientStore, config: &Config) -> Self {
        let scheduler = NarrationScheduler::new(ports.speech, client.state().narration_enabled);
        Self {
            api: ports.api,
            snapshots: Arc::new(RwLock::new(SnapshotStore::default())),
            poll_error: Arc::new(RwLock::new(None)),
            client: Arc::new(RwLock::new(client)),
            console: Arc::new(Mutex::new(HostConsole {
                narrator: Narrator::new(scheduler, config.narrator_seed),
                banner: None,
                spotlight: None,
            })),
            effects: EffectTrigger::new(ports.effects),
            overlay: OverlayCoordinator::new(config.overlay_dismiss),
        }
    }

    pub async fn from_config(config: &Config) -> Self {
        let speech: Arc<dyn SpeechPort> = match &config.speech_program {
            Some(program) => Arc::new(ProcessSpeech::new(program.clone())),
            None => {
                info!(
                    target: "narration",
                    "[White Elephant Host] Speech synthesis not supported. Narration will appear in the log."
                );
                Arc::new(LogSpeech)
            }
        };
        let client = match &config.client_state_path {
            Some(path) => ClientStore::load(path.clone()).await,
            None => ClientStore::default(),
        };
        let ports = Ports {
            api: Arc::new(HttpGameApi::new(config.upstream_url.clone())),
            speech,
            effects: Arc::new(LogEffects),
        };
        Self::new(ports, client, config)
    }

    /// Accepts a snapshot and reacts to what changed. The store stays
    /// write-locked until every consumer has seen the new pair.
    pub async fn apply(&self, snapshot: GameSnapshot) -> Vec<GameEvent> {
        let mut snapshots = self.snapshots.write().await;
        let accepted = snapshots.accept(snapshot);
        let events = derive_events(accepted.previous.as_deref(), &accepted.current);
        if !events.is_empty() {
            debug!(target: "poller", sequence = accepted.sequence, ?events, "snapshot changes");
        }

        let session = self.client.read().await.host().cloned();
        if let Some(session) = session {
            self.effects.dispatch(&events);
            let mut console = self.console.lock().await;
            for event in &events {
                if let GameEvent::GiftRevealed { gift_id, .. } = event {
                    console.spotlight = Some(gift_id.clone());
                }
            }
            console
                .narrator
                .observe(session.display_name(), &accepted.current, &events);
        }
        events
    }

    /// One polling step. Failures are reported and left for the next tick.
    pub async fn refresh(&self) {
        match self.api.fetch_state().await {
            Ok(snapshot) => {
                self.apply(snapshot).await;
                *self.poll_error.write().await = None;
            }
            Err(err) => {
                warn!(target: "poller", %err, "state refresh failed");
                let message = err.to_string();
                *self.poll_error.write().await = Some(message.clone());
                self.console.lock().await.banner = Some(message);
            }
        }
    }

    pub fn start_polling(&self, period: std::time::Duration) -> PollHandle {
        let state = self.clone();
        poller::spawn(period, move || {
            let state = state.clone();
            async move { state.refresh().await }
        })
    }

    pub async fn narration(&self) -> NarrationStatus {
        self.console.lock().await.narrator.scheduler().status()
    }

    pub fn overlay(&self) -> Option<OverlayKind> {
        self.overlay.current()
    }

    /// Releases timers and silences narration for good.
    pub async fn shutdown(&self) {
        self.overlay.clear();
        self.console.lock().await.narrator.scheduler().shutdown();
    }

    async fn host_session(&self) -> Result<HostSession, ClientError> {
        self.client
            .read()
            .await
            .host()
            .cloned()
            .ok_or(ClientError::AuthRequired)
    }

    async fn current_snapshot(&self) -> (Arc<GameSnapshot>, bool) {
        match self.snapshots.read().await.current() {
            Some(snapshot) => (snapshot, false),
            None => (Arc::default(), true),
        }
    }

    async fn run_command(&self, intent: CommandIntent) -> Result<(), ClientError> {
        let session = self.host_session().await?;
        let (snapshot, _) = self.current_snapshot().await;
        let Some((command, overlay)) = intent.resolve(&snapshot)? else {
            debug!(target: "upstream", ?intent, "no participant up, command skipped");
            return Ok(());
        };

        self.console.lock().await.banner = None;
        let ticket = overlay.map(|kind| self.overlay.begin(kind));

        match self.api.command(session.token, command).await {
            Ok(next) => {
                self.apply(next).await;
                if let Some(ticket) = ticket {
                    self.overlay.succeed(ticket);
                }
                Ok(())
            }
            Err(err) => {
                info!(target: "upstream", %err, ?intent, "command rejected");
                if let Some(ticket) = ticket {
                    self.overlay.fail(ticket);
                }
                self.console.lock().await.banner = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn host_page(&self, selection: &HostSelection) -> Result<HostPage, ClientError> {
        let session = self.host_session().await?;
        let (snapshot, loading) = self.current_snapshot().await;
        let console = self.console.lock().await;
        Ok(HostPage {
            host_name: session.display_name().to_string(),
            loading,
            view: project_host(&snapshot, selection),
            overlay: self.overlay.current().map(OverlayView::from),
            banner: console.banner.clone(),
            spotlight: console
                .spotlight
                .as_deref()
                .and_then(|gift_id| Spotlight::of(&snapshot, gift_id)),
            narration: console.narrator.scheduler().status(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CommandIntent {
    Shuffle,
    Unwrap(GiftId),
    Steal(GiftId),
    Pass,
    EndGame,
    FinishSwap,
    Reset,
}

impl CommandIntent {
    /// Binds the intent to the participant currently up. `None` means there
    /// is nobody to act for.
    fn resolve(
        &self,
        snapshot: &GameSnapshot,
    ) -> Result<Option<(HostCommand, Option<OverlayKind>)>, ClientError> {
        let swapping = swap_mode_active(snapshot);
        let acting = snapshot.current_participant_id.clone();
        let resolved = match self {
            CommandIntent::Shuffle => Some((HostCommand::Shuffle, Some(OverlayKind::Shuffle))),
            CommandIntent::Unwrap(gift_id) => acting.map(|participant_id| {
                let command = HostCommand::Unwrap {
                    participant_id,
                    gift_id: gift_id.clone(),
                };
                (command, Some(OverlayKind::Unwrap))
            }),
            CommandIntent::Steal(gift_id) => acting.map(|participant_id| {
                let command = HostCommand::Steal {
                    participant_id,
                    gift_id: gift_id.clone(),
                };
                let kind = if swapping {
                    OverlayKind::Swap
                } else {
                    OverlayKind::Steal
                };
                (command, Some(kind))
            }),
            CommandIntent::Pass => {
                if !swapping {
                    return Err(ClientError::InvalidRequest(
                        "Passing is only available during the swap round.".to_string(),
                    ));
                }
                acting.map(|participant_id| {
                    (HostCommand::Pass { participant_id }, Some(OverlayKind::Swap))
                })
            }
            CommandIntent::EndGame => Some((HostCommand::EndGame, None)),
            CommandIntent::FinishSwap => Some((HostCommand::FinishSwap, None)),
            CommandIntent::Reset => Some((HostCommand::Reset, None)),
        };
        Ok(resolved)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Spotlight {
    pub gift_id: GiftId,
    pub position: usize,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub holder_name: Option<String>,
    pub times_stolen: u32,
}

impl Spotlight {
    fn of(snapshot: &GameSnapshot, gift_id: &str) -> Option<Self> {
        let gift = snapshot.gift(gift_id)?;
        Some(Self {
            gift_id: gift.id.clone(),
            position: snapshot.gift_position(gift_id)?,
            name: gift.name.clone(),
            description: gift.description.clone(),
            image: gift.primary_image().map(str::to_string),
            holder_name: gift
                .winner_participant_id
                .as_deref()
                .and_then(|id| snapshot.participant_name(id))
                .map(str::to_string),
            times_stolen: gift.times_stolen,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPage {
    pub host_name: String,
    pub loading: bool,
    pub view: HostView,
    pub overlay: Option<OverlayView>,
    pub banner: Option<String>,
    pub spotlight: Option<Spotlight>,
    pub narration: NarrationStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorPage {
    pub loading: bool,
    pub error: Option<String>,
    pub view: SpectatorView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPage {
    pub host_name: String,
    pub summary: SummaryView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GiftChoice {
    gift_id: GiftId,
}

#[derive(Debug, Deserialize)]
struct NarrationToggle {
    enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    host_name: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/host", get(host_view))
        .route("/host/login", post(login))
        .route("/host/logout", post(logout))
        .route("/host/narration", put(set_narration))
        .route("/host/banner", delete(dismiss_banner))
        .route("/host/spotlight", delete(dismiss_spotlight))
        .route("/host/shuffle", post(shuffle))
        .route("/host/unwrap", post(unwrap_gift))
        .route("/host/steal", post(steal_gift))
        .route("/host/pass", post(pass_turn))
        .route("/host/end", post(end_game))
        .route("/host/swap/end", post(finish_swap))
        .route("/host/reset", post(reset_game))
        .route("/view", get(spectator_view))
        .route("/summary", get(summary_view))
        .with_state(state)
}

async fn host_view(
    State(state): State<AppState>,
    Query(selection): Query<HostSelection>,
) -> Result<Json<HostPage>, ClientError> {
    state.host_page(&selection).await.map(Json)
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, ClientError> {
    let grant = state.api.login(credentials).await?;
    let session = HostSession {
        token: grant.token,
        host_name: grant.host_name,
    };
    let host_name = session.display_name().to_string();
    state
        .client
        .write()
        .await
        .update(|client| client.host = Some(session))
        .await?;
    info!(target: "client_state", host = %host_name, "host signed in");

    state.refresh().await;
    Ok((StatusCode::OK, Json(LoginResponse { host_name })))
}

async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ClientError> {
    let saved = state
        .client
        .write()
        .await
        .update(|client| client.host = None)
        .await;
    {
        let mut console = state.console.lock().await;
        console.narrator.sign_out();
        console.banner = None;
        console.spotlight = None;
    }
    state.overlay.clear();
    info!(target: "client_state", "host signed out");
    saved?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_narration(
    State(state): State<AppState>,
    Json(toggle): Json<NarrationToggle>,
) -> Result<Json<NarrationStatus>, ClientError> {
    state.host_session().await?;
    let scheduler = state.console.lock().await.narrator.scheduler().clone();
    scheduler.set_enabled(toggle.enabled);
    state
        .client
        .write()
        .await
        .update(|client| client.narration_enabled = toggle.enabled)
        .await?;
    Ok(Json(scheduler.status()))
}

async fn dismiss_banner(State(state): State<AppState>) -> Result<StatusCode, ClientError> {
    state.host_session().await?;
    state.console.lock().await.banner = None;
    Ok(StatusCode::NO_CONTENT)
}

async fn dismiss_spotlight(State(state): State<AppState>) -> Result<StatusCode, ClientError> {
    state.host_session().await?;
    state.console.lock().await.spotlight = None;
    Ok(StatusCode::NO_CONTENT)
}

async fn command_page(
    state: &AppState,
    intent: CommandIntent,
    selection: &HostSelection,
) -> Result<Json<HostPage>, ClientError> {
    state.run_command(intent).await?;
    state.host_page(selection).await.map(Json)
}

async fn shuffle(
    State(state): State<AppState>,
    Query(selection): Query<HostSelection>,
) -> Result<Json<HostPage>, ClientError> {
    command_page(&state, CommandIntent::Shuffle, &selection).await
}

async fn unwrap_gift(
    State(state): State<AppState>,
    Query(selection): Query<HostSelection>,
    Json(choice): Json<GiftChoice>,
) -> Result<Json<HostPage>, ClientError> {
    command_page(&state, CommandIntent::Unwrap(choice.gift_id), &selection).await
}

async fn steal_gift(
    State(state): State<AppState>,
    Query(selection): Query<HostSelection>,
    Json(choice): Json<GiftChoice>,
) -> Result<Json<HostPage>, ClientError> {
    command_page(&state, CommandIntent::Steal(choice.gift_id), &selection).await
}

async fn pass_turn(
    State(state): State<AppState>,
    Query(selection): Query<HostSelection>,
) -> Result<Json<HostPage>, ClientError> {
    command_page(&state, CommandIntent::Pass, &selection).await
}

async fn end_game(
    State(state): State<AppState>,
    Query(selection): Query<HostSelection>,
) -> Result<Json<HostPage>, ClientError> {
    command_page(&state, CommandIntent::EndGame, &selection).await
}

async fn finish_swap(
    State(state): State<AppState>,
    Query(selection): Query<HostSelection>,
) -> Result<Json<HostPage>, ClientError> {
    command_page(&state, CommandIntent::FinishSwap, &selection).await
}

async fn reset_game(
    State(state): State<AppState>,
    Query(selection): Query<HostSelection>,
) -> Result<Json<HostPage>, ClientError> {
    command_page(&state, CommandIntent::Reset, &selection).await
}

async fn spectator_view(
    State(state): State<AppState>,
    Query(selection): Query<SpectatorSelection>,
) -> Json<SpectatorPage> {
    let (snapshot, loading) = state.current_snapshot().await;
    let error = state.poll_error.read().await.clone();
    Json(SpectatorPage {
        loading,
        error,
        view: project_spectator(&snapshot, &selection),
    })
}

async fn summary_view(State(state): State<AppState>) -> Result<Json<SummaryPage>, ClientError> {
    let session = state.host_session().await?;
    let (snapshot, _) = state.current_snapshot().await;
    Ok(Json(SummaryPage {
        host_name: session.display_name().to_string(),
        summary: project_summary(&snapshot),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::tests::RecordingEffects;
    use crate::effects::Celebration;
    use crate::narration::tests::StuckSpeech;
    use crate::upstream::LoginGrant;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use game_core::{Gift, Participant};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeGameApi {
        state: StdMutex<GameSnapshot>,
        fetch_error: StdMutex<Option<ClientError>>,
        command_error: StdMutex<Option<ClientError>>,
        next_state: StdMutex<Option<GameSnapshot>>,
        commands: StdMutex<Vec<(String, HostCommand)>>,
    }

    impl FakeGameApi {
        fn with_state(snapshot: GameSnapshot) -> Arc<Self> {
            let api = Self::default();
            *api.state.lock().unwrap() = snapshot;
            Arc::new(api)
        }

        fn commands(&self) -> Vec<(String, HostCommand)> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl GameApi for FakeGameApi {
        fn login(&self, credentials: Credentials) -> BoxFuture<'static, Result<LoginGrant, ClientError>> {
            let result = if credentials.password == "mistletoe" {
                Ok(LoginGrant {
                    token: "tok-1".into(),
                    host_name: Some("Santa".into()),
                })
            } else {
                Err(ClientError::LoginFailed("Invalid credentials".into()))
            };
            futures::future::ready(result).boxed()
        }

        fn fetch_state(&self) -> BoxFuture<'static, Result<GameSnapshot, ClientError>> {
            let result = match self.fetch_error.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(self.state.lock().unwrap().clone()),
            };
            futures::future::ready(result).boxed()
        }

        fn command(
            &self,
            token: String,
            command: HostCommand,
        ) -> BoxFuture<'static, Result<GameSnapshot, ClientError>> {
            self.commands.lock().unwrap().push((token, command));
            let result = match self.command_error.lock().unwrap().take() {
                Some(err) => Err(err),
                None => {
                    let mut state = self.state.lock().unwrap();
                    if let Some(next) = self.next_state.lock().unwrap().take() {
                        *state = next;
                    }
                    Ok(state.clone())
                }
            };
            futures::future::ready(result).boxed()
        }
    }

    fn game() -> GameSnapshot {
        GameSnapshot {
            participants: vec![
                Participant {
                    id: "P-ALEX".into(),
                    name: "Alex".into(),
                    country: Some("Canada".into()),
                    ..Participant::default()
                },
                Participant {
                    id: "p-bea".into(),
                    name: "Bea".into(),
                    country: Some("Canada".into()),
                    ..Participant::default()
                },
            ],
            gifts: vec![
                Gift {
                    id: "g1".into(),
                    name: "Waffle Iron".into(),
                    description: "a heart-shaped waffle iron".into(),
                    original_owner_participant_id: Some("P-ALEX".into()),
                    country: Some("Canada".into()),
                    ..Gift::default()
                },
                Gift {
                    id: "g2".into(),
                    name: "Snow Globe".into(),
                    description: "a tiny blizzard".into(),
                    original_owner_participant_id: Some("p-bea".into()),
                    country: Some("Canada".into()),
                    ..Gift::default()
                },
            ],
            upcoming_turn_order: vec!["p-bea".into()],
            completed_turn_order: vec!["P-ALEX".into()],
            current_participant_id: Some("P-ALEX".into()),
            game_started: true,
            ..GameSnapshot::default()
        }
    }

    fn revealed_g1() -> GameSnapshot {
        let mut next = game();
        next.gifts[0].revealed = true;
        next.gifts[0].winner_participant_id = Some("P-ALEX".into());
        next.current_participant_id = Some("p-bea".into());
        next
    }

    fn test_state(api: Arc<FakeGameApi>, client: ClientStore) -> (AppState, Arc<RecordingEffects>) {
        let effects = Arc::new(RecordingEffects::default());
        let ports = Ports {
            api,
            speech: Arc::new(StuckSpeech),
            effects: effects.clone(),
        };
        (AppState::new(ports, client, &Config::default()), effects)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> axum::response::Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn text_body(res: axum::response::Response) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn sign_in(app: &Router) {
        let res = send(
            app,
            Method::POST,
            "/host/login",
            Some(json!({ "username": "santa", "password": "mistletoe" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    fn lines_matching(status: &NarrationStatus, needle: &str) -> usize {
        status
            .speaking
            .iter()
            .chain(status.queued.iter())
            .filter(|line| line.contains(needle))
            .count()
    }

    #[tokio::test]
    async fn host_routes_require_login() {
        let (state, _) = test_state(FakeGameApi::with_state(game()), ClientStore::default());
        let app = app(state);

        for uri in ["/host", "/summary"] {
            let res = send(&app, Method::GET, uri, None).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn login_loads_state_and_greets() {
        let (state, _) = test_state(FakeGameApi::with_state(game()), ClientStore::default());
        let app = app(state);

        let res = send(
            &app,
            Method::POST,
            "/host/login",
            Some(json!({ "username": "santa", "password": "wrong" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(text_body(res).await, "Invalid credentials");

        let res = send(
            &app,
            Method::POST,
            "/host/login",
            Some(json!({ "username": "santa", "password": "mistletoe" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["hostName"], "Santa");

        let res = send(&app, Method::GET, "/host", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["hostName"], "Santa");
        assert_eq!(body["loading"], false);
        assert_eq!(body["view"]["gifts"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["narration"]["speaking"],
            "Ho ho ho! Santa reporting for White Elephant duty."
        );
    }

    #[tokio::test]
    async fn commands_without_token_never_reach_upstream() {
        let api = FakeGameApi::with_state(game());
        let (state, _) = test_state(api.clone(), ClientStore::default());
        state.refresh().await;
        let app = app(state);

        let res = send(&app, Method::POST, "/host/unwrap", Some(json!({ "giftId": "g1" }))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(text_body(res).await, "Host login required for that action.");
        assert!(api.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unwrap_celebrates_once_and_overlay_lingers() {
        let api = FakeGameApi::with_state(game());
        let (state, effects) = test_state(api.clone(), ClientStore::default());
        let app = app(state.clone());
        sign_in(&app).await;

        *api.next_state.lock().unwrap() = Some(revealed_g1());
        let res = send(&app, Method::POST, "/host/unwrap", Some(json!({ "giftId": "g1" }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["overlay"]["kind"], "unwrap");
        assert_eq!(body["spotlight"]["giftId"], "g1");
        assert_eq!(body["spotlight"]["holderName"], "Alex");
        assert_eq!(
            api.commands(),
            vec![(
                "tok-1".to_string(),
                HostCommand::Unwrap {
                    participant_id: "P-ALEX".into(),
                    gift_id: "g1".into()
                }
            )]
        );

        // the next poll returns the identical snapshot
        state.refresh().await;
        state.refresh().await;
        assert_eq!(
            *effects.fired.lock().unwrap(),
            vec![(Celebration::Reveal, "g1".to_string())]
        );
        assert_eq!(lines_matching(&state.narration().await, "cracked open"), 1);
        assert_eq!(lines_matching(&state.narration().await, "Bea, step up"), 1);

        tokio::time::sleep(Duration::from_millis(1799)).await;
        assert_eq!(state.overlay(), Some(OverlayKind::Unwrap));
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(state.overlay(), None);
    }

    #[tokio::test]
    async fn rejected_steal_sets_banner_and_drops_overlay() {
        let api = FakeGameApi::with_state(game());
        let (state, _) = test_state(api.clone(), ClientStore::default());
        let app = app(state.clone());
        sign_in(&app).await;

        *api.command_error.lock().unwrap() = Some(ClientError::Command("Gift is locked".into()));
        let res = send(&app, Method::POST, "/host/steal", Some(json!({ "giftId": "g2" }))).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(text_body(res).await, "Gift is locked");
        assert_eq!(state.overlay(), None);
        assert_eq!(api.commands().len(), 1);

        let body = json_body(send(&app, Method::GET, "/host", None).await).await;
        assert_eq!(body["banner"], "Gift is locked");
        assert_eq!(body["overlay"], Value::Null);

        let res = send(&app, Method::DELETE, "/host/banner", None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let body = json_body(send(&app, Method::GET, "/host", None).await).await;
        assert_eq!(body["banner"], Value::Null);
    }

    #[tokio::test]
    async fn pass_outside_swap_is_refused_locally() {
        let api = FakeGameApi::with_state(game());
        let (state, _) = test_state(api.clone(), ClientStore::default());
        let app = app(state);
        sign_in(&app).await;

        let res = send(&app, Method::POST, "/host/pass", None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(api.commands().is_empty());
    }

    #[tokio::test]
    async fn steal_during_swap_uses_swap_overlay() {
        let mut swap = revealed_g1();
        swap.swap_mode_active = true;
        let api = FakeGameApi::with_state(swap);
        let (state, _) = test_state(api.clone(), ClientStore::default());
        let app = app(state);
        sign_in(&app).await;

        let res = send(&app, Method::POST, "/host/steal", Some(json!({ "giftId": "g1" }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["overlay"]["kind"], "swap");
        assert_eq!(
            api.commands()[0].1,
            HostCommand::Steal {
                participant_id: "p-bea".into(),
                gift_id: "g1".into()
            }
        );
    }

    #[tokio::test]
    async fn spectator_lookup_is_case_insensitive() {
        let (state, effects) = test_state(FakeGameApi::with_state(game()), ClientStore::default());
        state.refresh().await;
        let app = app(state);

        let res = send(&app, Method::GET, "/view?participant=p-alex", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["view"]["participantCode"], "p-alex");
        assert_eq!(body["view"]["lookup"]["status"], "found");
        assert_eq!(body["view"]["lookup"]["giftId"], "g1");
        assert_eq!(body["view"]["lookup"]["position"], 1);
        assert!(effects.fired.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_surfaces_until_next_success() {
        let api = FakeGameApi::with_state(game());
        let (state, _) = test_state(api.clone(), ClientStore::default());
        let app = app(state.clone());

        *api.fetch_error.lock().unwrap() = Some(ClientError::Transport("upstream down".into()));
        state.refresh().await;
        let body = json_body(send(&app, Method::GET, "/view", None).await).await;
        assert_eq!(body["loading"], true);
        assert_eq!(body["error"], "upstream down");

        *api.fetch_error.lock().unwrap() = None;
        state.refresh().await;
        let body = json_body(send(&app, Method::GET, "/view", None).await).await;
        assert_eq!(body["loading"], false);
        assert_eq!(body["error"], Value::Null);
    }

    #[tokio::test]
    async fn summary_fills_in_after_completion() {
        let api = FakeGameApi::with_state(game());
        let (state, _) = test_state(api.clone(), ClientStore::default());
        let app = app(state.clone());
        sign_in(&app).await;

        let body = json_body(send(&app, Method::GET, "/summary", None).await).await;
        assert_eq!(body["summary"]["ready"], false);

        let mut done = revealed_g1();
        done.game_completed = true;
        done.gifts[1].revealed = true;
        done.gifts[1].winner_participant_id = Some("p-bea".into());
        *api.state.lock().unwrap() = done;
        state.refresh().await;

        let body = json_body(send(&app, Method::GET, "/summary", None).await).await;
        assert_eq!(body["hostName"], "Santa");
        assert_eq!(body["summary"]["ready"], true);
        assert_eq!(body["summary"]["rows"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn logout_clears_session_and_narration() {
        let (state, _) = test_state(FakeGameApi::with_state(game()), ClientStore::default());
        let app = app(state.clone());
        sign_in(&app).await;
        assert!(state.narration().await.speaking.is_some());

        let res = send(&app, Method::POST, "/host/logout", None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.narration().await.speaking, None);
        let res = send(&app, Method::GET, "/host", None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn narration_toggle_requires_host() {
        let path = std::env::temp_dir().join(format!("live_view_state_{}.json", Uuid::new_v4()));
        let (state, _) = test_state(
            FakeGameApi::with_state(game()),
            ClientStore::load(path.clone()).await,
        );
        let app = app(state.clone());
        sign_in(&app).await;
        let res = send(&app, Method::POST, "/host/logout", None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = send(&app, Method::PUT, "/host/narration", Some(json!({ "enabled": false }))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(state.narration().await.enabled);

        let reloaded = ClientStore::load(path.clone()).await;
        assert!(reloaded.state().narration_enabled);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn session_and_narration_preference_persist() {
        let path = std::env::temp_dir().join(format!("live_view_state_{}.json", Uuid::new_v4()));
        let (state, _) = test_state(
            FakeGameApi::with_state(game()),
            ClientStore::load(path.clone()).await,
        );
        let app = app(state);
        sign_in(&app).await;

        let res = send(&app, Method::PUT, "/host/narration", Some(json!({ "enabled": false }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["enabled"], false);
        assert_eq!(body["speaking"], Value::Null);

        let reloaded = ClientStore::load(path.clone()).await;
        assert_eq!(reloaded.host().map(|h| h.token.as_str()), Some("tok-1"));
        assert!(!reloaded.state().narration_enabled);
        let _ = tokio::fs::remove_file(&path).await;
    }
}
