//! End-to-end flows against a scripted backend: a local WebSocket server
//! answering canned replies (with the nesting drift the real backend
//! shows) plus a mock HTTP server for auth and uploads.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dobro_client::commands::chat::ChatSession;
use dobro_client::commands::{dashboard, events, organizer, tasks};
use dobro_client::{AppState, ClientConfig, UploadFile};
use dobro_shared::types::{ChatId, EventId, TaskId, TaskStatus, UserId};
use dobro_store::Database;

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

fn alla() -> Value {
    json!({ "_id": "u1", "email": "alla@dobro.org", "full_name": "Alla Petrova", "role": "organizer" })
}

fn boris() -> Value {
    json!({ "_id": "u2", "email": "boris@dobro.org", "full_name": "Boris Ivanov", "role": "volunteer" })
}

fn ev1() -> Value {
    json!({
        "_id": "ev1", "title": "Park cleanup", "description": "Gloves provided",
        "start_datetime": "2025-07-05T10:00", "location": "Riverside park",
        "category": "Environment", "status": "active", "required_volunteers": 5,
        "volunteers": ["u2"], "created_by": "u1", "chat_id": "c1"
    })
}

fn ev2() -> Value {
    json!({
        "_id": "ev2", "title": "Food drive", "start_datetime": "2025-07-12T09:00",
        "location": "Main square", "category": "Community", "status": "active",
        "required_volunteers": 3, "volunteers": [], "created_by": "u2"
    })
}

fn ev3() -> Value {
    json!({
        "_id": "ev3", "title": "Shelter walk", "start_datetime": "2025-07-20T11:00",
        "location": "Old shelter", "category": "Animals", "status": "active",
        "required_volunteers": 2, "volunteers": ["u1", "u2"], "created_by": "u1"
    })
}

fn t1() -> Value {
    json!({
        "_id": "t1", "title": "Print posters", "status": "in_progress",
        "assigned_to": "u1", "created_by": "u2", "event_id": "ev1"
    })
}

fn t2() -> Value {
    json!({
        "_id": "t2", "title": "Book the hall", "status": "in_progress",
        "assigned_to": "u2", "created_by": "u1", "event_id": "ev2"
    })
}

/// Build the reply for one request, mimicking the backend's uneven payload
/// nesting (flat, `message.*`, and `message.data.*` all appear).
fn answer(request: &Value) -> Option<Value> {
    let msg = &request["message"];
    let action = msg["action"].as_str()?;
    let data = &msg["data"];

    let reply = match action {
        "get_all_users" => json!({
            "topic": "user_responses",
            "message": {
                "action": "get_all_users", "status": "success",
                "message": { "users": [alla(), boris()] }
            }
        }),
        "get_upcoming_events" => json!({
            "message": {
                "action": "get_upcoming_events", "status": "success",
                "events": [ev1(), ev2(), ev3()]
            }
        }),
        "get_user_events" => json!({
            "message": {
                "action": "get_user_events", "status": "success",
                "created_events": [ev1(), ev3()],
                "volunteer_events": [ev3()]
            }
        }),
        "register_volunteer" => json!({
            "message": {
                "action": "register_volunteer", "status": "success",
                "data": { "event_id": data["event_id"], "user_id": data["user_id"] }
            }
        }),
        "unregister_volunteer" => json!({
            "message": {
                "action": "unregister_volunteer", "status": "success",
                "data": { "event_id": data["event_id"], "user_id": data["user_id"] }
            }
        }),
        "volunteer_count" => json!({
            "message": {
                "action": "volunteer_count", "status": "success",
                "event_id": data["event_id"], "count": 1
            }
        }),
        "create_event" => json!({
            "message": {
                "action": "create_event", "status": "success",
                "event": {
                    "_id": "ev9",
                    "title": data["title"],
                    "description": data["description"],
                    "start_datetime": data["start_datetime"],
                    "location": data["location"],
                    "category": data["category"],
                    "status": "draft",
                    "required_volunteers": data["required_volunteers"],
                    "volunteers": [],
                    "created_by": data["created_by"]
                }
            }
        }),
        "update_event" => {
            let mut event = ev1();
            if let Some(report) = data.get("report_files") {
                event["report_files"] = report.clone();
            }
            if let Some(title) = data.get("title") {
                event["title"] = title.clone();
            }
            json!({
                "message": { "action": "update_event", "status": "success", "event": event }
            })
        }
        "delete_event" => json!({
            "message": {
                "action": "delete_event", "status": "success",
                "data": { "event_id": data["event_id"] }
            }
        }),
        "get_tasks_by_user" => json!({
            "message": {
                "action": "get_tasks_by_user", "status": "success",
                "message": { "assigned_tasks": [t1()], "created_tasks": [t2()] }
            }
        }),
        "assign_task" => json!({
            "message": {
                "action": "assign_task", "status": "success",
                "task": {
                    "_id": "t9",
                    "title": data["title"],
                    "description": data["description"],
                    "status": "in_progress",
                    "assigned_to": data["assigned_to"],
                    "created_by": data["created_by"],
                    "event_id": data["event_id"]
                }
            }
        }),
        "update_task" => json!({
            "message": {
                "action": "update_task", "status": "success",
                "task": {
                    "_id": data["_id"], "title": "Print posters",
                    "status": data["status"],
                    "assigned_to": "u1", "created_by": "u2", "event_id": "ev1"
                }
            }
        }),
        "get_task_comments" => {
            let task_id = data["task_id"].as_str().unwrap_or("t1");
            json!({
                "message": {
                    "action": "get_task_comments", "status": "success",
                    "data": {
                        "task_id": task_id,
                        "comments": [{
                            "task_id": task_id, "user_id": "u2",
                            "text": format!("first update on {task_id}"),
                            "created_at": "2025-07-01T08:00"
                        }]
                    }
                }
            })
        }
        "add_task_comment" => json!({
            "message": {
                "action": "add_task_comment", "status": "success",
                "message": {
                    "comment": {
                        "task_id": data["task_id"],
                        "user_id": data["user_id"],
                        "text": data["text"],
                        "created_at": "2025-07-01T08:30"
                    }
                }
            }
        }),
        "get_task_attachments" => json!({
            "message": {
                "action": "get_task_attachments", "status": "success",
                "data": { "task_id": data["task_id"], "attachments": ["/files/spec1.png"] }
            }
        }),
        "add_task_attachment" => json!({
            "message": {
                "action": "add_task_attachment", "status": "success",
                "message": { "task_id": data["task_id"], "attachments": data["attachments"] }
            }
        }),
        "get_chat_messages" => json!({
            "message": {
                "action": "get_chat_messages", "status": "success",
                "message": {
                    "chat_id": data["chat_id"],
                    "messages": [{
                        "chat_id": "c1", "author": "u2", "message": "see you there!",
                        "timestamp": "2025-07-01T09:00"
                    }]
                }
            }
        }),
        "add_chat_message" => json!({
            "message": {
                "action": "add_chat_message", "status": "success",
                "new_message": {
                    "chat_id": data["chat_id"],
                    "author": data["author"],
                    "message": data["message"],
                    "timestamp": "2025-07-01T09:05"
                }
            }
        }),
        "update_user" => json!({
            "message": {
                "action": "update_user", "status": "success",
                "message": {
                    "updated_user": {
                        "_id": data["_id"], "email": "alla@dobro.org",
                        "full_name": "Alla Petrova", "role": "organizer",
                        "phone": data["phone"]
                    }
                }
            }
        }),
        _ => return None,
    };
    Some(reply)
}

async fn run_backend(listener: TcpListener) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        tokio::spawn(async move {
            let Ok(mut ws) = accept_async(stream).await else {
                return;
            };
            while let Some(Ok(frame)) = ws.next().await {
                let text = match frame {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
                    continue;
                };
                if let Some(reply) = answer(&request) {
                    if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn test_config(api_url: String, ws_url: String) -> ClientConfig {
    ClientConfig {
        api_url,
        ws_url,
        request_timeout: Duration::from_secs(3),
        reconnect_delay: Duration::from_millis(100),
    }
}

async fn mock_login(http: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-1",
            "message": { "body": { "user_id": "u1" } }
        })))
        .mount(http)
        .await;
}

async fn mock_upload(http: &MockServer, urls: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/upload-task-attachments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "uploaded": urls
        })))
        .mount(http)
        .await;
}

async fn start_world() -> (MockServer, String, tempfile::TempDir) {
    let http = MockServer::start().await;
    mock_login(&http).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(run_backend(listener));
    let dir = tempfile::tempdir().unwrap();
    (http, ws_url, dir)
}

async fn boot(http: &MockServer, ws_url: &str, dir: &tempfile::TempDir) -> AppState {
    let config = test_config(http.uri(), ws_url.to_string());
    AppState::init_at(config, &dir.path().join("dobro.db"))
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_event_browsing_and_logout() {
    let (http, ws_url, dir) = start_world().await;
    let state = boot(&http, &ws_url, &dir).await;
    assert!(!state.session.is_authenticated());

    // Login resolves the full user record from the directory, not just
    // the id the HTTP reply carries.
    let user = state.session.login("alla@dobro.org", "pw").await.unwrap();
    assert_eq!(user.id, UserId::new("u1"));
    assert_eq!(user.full_name.as_deref(), Some("Alla Petrova"));
    assert!(state.session.is_authenticated());
    assert_eq!(state.db.lock().token().unwrap().as_deref(), Some("tok-1"));

    // Browse: three events land in the cache, joined counts derived
    let upcoming = events::get_upcoming_events(&state, None, None).await.unwrap();
    assert_eq!(upcoming.len(), 3);
    assert_eq!(state.events.len(), 3);
    for event in &upcoming {
        assert_eq!(event.joined_count(), event.volunteers.len());
    }
    assert_eq!(
        state.events.by_category("Animals")[0].id,
        EventId::new("ev3")
    );

    // Register twice, the second delivery must not double-count
    let ev2_id = EventId::new("ev2");
    events::register_volunteer(&state, &ev2_id).await.unwrap();
    events::register_volunteer(&state, &ev2_id).await.unwrap();
    let cached = state.events.get(&ev2_id).unwrap();
    assert_eq!(cached.joined_count(), 1);
    assert!(cached.has_volunteer(&UserId::new("u1")));

    // Unregister floors at zero
    events::unregister_volunteer(&state, &ev2_id).await.unwrap();
    events::unregister_volunteer(&state, &ev2_id).await.unwrap();
    assert_eq!(state.events.get(&ev2_id).unwrap().joined_count(), 0);

    assert_eq!(events::volunteer_count(&state, &EventId::new("ev1")).await.unwrap(), 1);

    // Dashboard split is derived from the cache
    let summary = dashboard::get_user_events(&state).await.unwrap();
    let created: Vec<_> = summary.created.iter().map(|e| e.id.as_str().to_string()).collect();
    assert_eq!(summary.created.len(), 2);
    assert!(created.contains(&"ev1".to_string()) && created.contains(&"ev3".to_string()));
    assert_eq!(summary.volunteering.len(), 1);
    assert_eq!(summary.volunteering[0].id, EventId::new("ev3"));

    // Logout wipes everything; a later restore finds nothing
    state.session.logout().await.unwrap();
    assert!(!state.session.is_authenticated());
    assert_eq!(state.db.lock().token().unwrap(), None);
    assert_eq!(state.db.lock().cached_profile().unwrap(), None);
    assert!(state.session.restore().await.unwrap().is_none());
}

#[tokio::test]
async fn chat_opens_once_and_appends_confirmed_messages() {
    let (http, ws_url, dir) = start_world().await;
    let state = boot(&http, &ws_url, &dir).await;
    state.session.login("alla@dobro.org", "pw").await.unwrap();

    let upcoming = events::get_upcoming_events(&state, None, None).await.unwrap();
    let park_cleanup = upcoming.iter().find(|e| e.id.as_str() == "ev1").unwrap();
    let chat = ChatSession::for_event(park_cleanup).expect("ev1 has a chat room");

    chat.open(&state).await.unwrap();
    assert_eq!(chat.transcript(&state).len(), 1);

    let sent = chat.send(&state, "On my way").await.unwrap();
    assert_eq!(sent.author, UserId::new("u1"));
    assert_eq!(chat.transcript(&state).len(), 2);

    // A second open is a no-op: the transcript is not re-fetched
    chat.open(&state).await.unwrap();
    assert_eq!(chat.transcript(&state).len(), 2);
}

#[tokio::test]
async fn chat_open_waits_for_the_socket() {
    let dir = tempfile::tempdir().unwrap();

    // Reserve an address, then boot with nobody listening on it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig {
        api_url: "http://127.0.0.1:9".into(),
        ws_url: format!("ws://{addr}"),
        request_timeout: Duration::from_secs(5),
        reconnect_delay: Duration::from_millis(50),
    };
    let state = AppState::init_at(config, &dir.path().join("dobro.db"))
        .await
        .unwrap();
    state.conn.set_auto_reconnect(true).await.unwrap();

    // The backend appears only after the open is already in flight; the
    // history request must be held back until the dial succeeds, not lost.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let listener = TcpListener::bind(addr).await.unwrap();
        run_backend(listener).await;
    });

    let chat = ChatSession::new(ChatId::new("c1"));
    chat.open(&state).await.unwrap();
    assert_eq!(chat.transcript(&state).len(), 1);
}

#[tokio::test]
async fn tasks_comments_attachments_and_profile() {
    let (http, ws_url, dir) = start_world().await;
    mock_upload(&http, &["/files/photo1.png"]).await;
    let state = boot(&http, &ws_url, &dir).await;
    state.session.login("alla@dobro.org", "pw").await.unwrap();

    let my_tasks = dashboard::get_tasks_by_user(&state).await.unwrap();
    assert_eq!(my_tasks.assigned.len(), 1);
    assert_eq!(my_tasks.assigned[0].id, TaskId::new("t1"));
    assert_eq!(my_tasks.created.len(), 1);
    assert_eq!(my_tasks.created[0].id, TaskId::new("t2"));

    let t1_id = TaskId::new("t1");
    let thread = tasks::get_task_comments(&state, &t1_id).await.unwrap();
    assert_eq!(thread.len(), 1);

    tasks::add_task_comment(&state, &t1_id, "done, posters are up", vec![])
        .await
        .unwrap();
    let cached = state.tasks.get(&t1_id).unwrap();
    assert_eq!(cached.comments.len(), 2);
    assert_eq!(cached.comments[1].text, "done, posters are up");

    // Attachments: fetch replaces, upload adds what the backend confirmed
    let listed = tasks::get_task_attachments(&state, &t1_id).await.unwrap();
    assert_eq!(listed, vec!["/files/spec1.png"]);
    let uploaded = tasks::add_task_attachment(
        &state,
        &t1_id,
        vec![UploadFile {
            file_name: "photo1.png".into(),
            bytes: vec![1, 2, 3],
        }],
    )
    .await
    .unwrap();
    assert_eq!(uploaded, vec!["/files/photo1.png"]);
    let cached = state.tasks.get(&t1_id).unwrap();
    assert!(cached.attachments.contains(&"/files/spec1.png".to_string()));
    assert!(cached.attachments.contains(&"/files/photo1.png".to_string()));

    // Close the task
    let update = organizer::TaskUpdate {
        status: Some(TaskStatus::Closed),
        ..organizer::TaskUpdate::new(t1_id.clone())
    };
    organizer::update_task(&state, &update).await.unwrap();
    assert_eq!(state.tasks.get(&t1_id).unwrap().status, TaskStatus::Closed);

    // Profile edit updates the identity slot and the persisted profile
    let profile = dashboard::ProfileUpdate {
        phone: Some("+7 900 000-00-00".into()),
        ..dashboard::ProfileUpdate::default()
    };
    let updated = dashboard::update_profile(&state, &profile).await.unwrap();
    assert_eq!(updated.phone.as_deref(), Some("+7 900 000-00-00"));
    assert_eq!(
        state.session.current_user().unwrap().phone.as_deref(),
        Some("+7 900 000-00-00")
    );
    let stored = state.db.lock().cached_profile().unwrap().unwrap();
    assert_eq!(stored.phone.as_deref(), Some("+7 900 000-00-00"));
}

#[tokio::test]
async fn concurrent_comment_fetches_stay_with_their_tasks() {
    let (http, ws_url, dir) = start_world().await;
    let state = boot(&http, &ws_url, &dir).await;
    state.session.login("alla@dobro.org", "pw").await.unwrap();

    dashboard::get_tasks_by_user(&state).await.unwrap();
    let t1_id = TaskId::new("t1");
    let t2_id = TaskId::new("t2");

    // Both fetches share one action; each must end up with its own reply,
    // not whichever lands first.
    let (first, second) = tokio::join!(
        tasks::get_task_comments(&state, &t1_id),
        tasks::get_task_comments(&state, &t2_id)
    );
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].text, "first update on t1");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].text, "first update on t2");

    // The caches sorted the threads the same way
    assert_eq!(
        state.tasks.get(&t1_id).unwrap().comments[0].text,
        "first update on t1"
    );
    assert_eq!(
        state.tasks.get(&t2_id).unwrap().comments[0].text,
        "first update on t2"
    );
}

#[tokio::test]
async fn organizer_creates_reports_and_deletes() {
    let (http, ws_url, dir) = start_world().await;
    mock_upload(&http, &["/files/report.pdf"]).await;
    let state = boot(&http, &ws_url, &dir).await;
    state.session.login("alla@dobro.org", "pw").await.unwrap();

    let new_event = organizer::NewEvent {
        title: "Beach day".into(),
        description: "Bring sunscreen".into(),
        start_datetime: "2025-08-02T12:00".into(),
        end_datetime: None,
        location: "East beach".into(),
        category: "Environment".into(),
        required_volunteers: 8,
        photo_url: None,
        donations: None,
    };
    let created = organizer::create_event(&state, &new_event).await.unwrap();
    let created = created.expect("backend echoes the stored event");
    assert_eq!(created.id, EventId::new("ev9"));
    assert_eq!(created.title, "Beach day");
    assert!(state.events.get(&EventId::new("ev9")).is_some());

    // Two-phase report upload: HTTP upload, then update_event carries the
    // merged report_files list
    let ev1_id = EventId::new("ev1");
    let urls = organizer::upload_event_report(
        &state,
        &ev1_id,
        vec![UploadFile {
            file_name: "report.pdf".into(),
            bytes: vec![9, 9],
        }],
    )
    .await
    .unwrap();
    assert_eq!(urls, vec!["/files/report.pdf"]);
    let cached = state.events.get(&ev1_id).unwrap();
    assert!(cached.report_files.contains(&"/files/report.pdf".to_string()));

    organizer::delete_event(&state, &EventId::new("ev9")).await.unwrap();
    assert!(state.events.get(&EventId::new("ev9")).is_none());

    // Hand a task to a volunteer
    let assignment = organizer::NewTask {
        title: "Collect trash bags".into(),
        description: "Before noon".into(),
        deadline: None,
        event_id: Some(ev1_id.clone()),
        assigned_to: Some(UserId::new("u2")),
    };
    let task = organizer::assign_task(&state, &assignment).await.unwrap();
    let task = task.expect("backend echoes the stored task");
    assert_eq!(task.assigned_to, Some(UserId::new("u2")));
    assert!(state.tasks.get(&TaskId::new("t9")).is_some());
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

fn seed_session(dir: &tempfile::TempDir, user_id: &str) {
    let db_path = dir.path().join("dobro.db");
    let mut db = Database::open_at(&db_path).unwrap();
    db.save_session("tok-old", &UserId::new(user_id)).unwrap();
}

#[tokio::test]
async fn restore_resumes_a_saved_session() {
    let (http, ws_url, dir) = start_world().await;
    seed_session(&dir, "u1");

    let state = boot(&http, &ws_url, &dir).await;
    assert!(state.session.is_authenticated());
    let user = state.session.current_user().unwrap();
    assert_eq!(user.id, UserId::new("u1"));
    assert_eq!(user.full_name.as_deref(), Some("Alla Petrova"));
}

#[tokio::test]
async fn restore_clears_a_stale_session() {
    let (http, ws_url, dir) = start_world().await;
    seed_session(&dir, "ghost");

    let state = boot(&http, &ws_url, &dir).await;
    assert!(!state.session.is_authenticated());
    // The dead credentials are gone
    assert_eq!(state.db.lock().token().unwrap(), None);
}

#[tokio::test]
async fn restore_timeout_keeps_credentials() {
    let dir = tempfile::tempdir().unwrap();
    seed_session(&dir, "u1");

    // Nothing listens on the socket; verification can only time out
    let config = ClientConfig {
        api_url: "http://127.0.0.1:9".into(),
        ws_url: "ws://127.0.0.1:9".into(),
        request_timeout: Duration::from_millis(300),
        reconnect_delay: Duration::from_millis(50),
    };
    let state = AppState::init_at(config, &dir.path().join("dobro.db"))
        .await
        .unwrap();

    assert!(!state.session.is_authenticated());
    assert_eq!(state.db.lock().token().unwrap().as_deref(), Some("tok-old"));
}

#[tokio::test]
async fn directory_reply_heals_an_unverified_session() {
    let dir = tempfile::tempdir().unwrap();
    seed_session(&dir, "u1");

    // Reserve an address, then boot with nobody listening on it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig {
        api_url: "http://127.0.0.1:9".into(),
        ws_url: format!("ws://{addr}"),
        request_timeout: Duration::from_millis(300),
        reconnect_delay: Duration::from_millis(50),
    };
    let state = AppState::init_at(config, &dir.path().join("dobro.db"))
        .await
        .unwrap();
    assert!(!state.session.is_authenticated());

    // The backend comes up; the reconnect loop finds it, the directory
    // refresh answers, and the saved session completes without a login.
    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(run_backend(listener));

    for _ in 0..100 {
        if state.session.is_authenticated() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(state.session.is_authenticated());
    assert_eq!(
        state.session.current_user().unwrap().id,
        UserId::new("u1")
    );
}

#[tokio::test]
async fn login_survives_a_directory_outage() {
    let dir = tempfile::tempdir().unwrap();
    let http = MockServer::start().await;
    mock_login(&http).await;

    // Reserve an address, then boot with nobody listening on it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig {
        api_url: http.uri(),
        ws_url: format!("ws://{addr}"),
        request_timeout: Duration::from_millis(300),
        reconnect_delay: Duration::from_millis(50),
    };
    let state = AppState::init_at(config, &dir.path().join("dobro.db"))
        .await
        .unwrap();

    // HTTP auth decides the login; the unreachable directory only costs
    // the profile details.
    let user = state.session.login("alla@dobro.org", "pw").await.unwrap();
    assert!(state.session.is_authenticated());
    assert_eq!(user.id, UserId::new("u1"));
    assert_eq!(user.email, "alla@dobro.org");
    assert_eq!(user.full_name, None);
    assert_eq!(state.db.lock().token().unwrap().as_deref(), Some("tok-1"));

    // The backend comes up; the directory refresh completes the profile
    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(run_backend(listener));

    for _ in 0..100 {
        if state
            .session
            .current_user()
            .and_then(|u| u.full_name)
            .is_some()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let healed = state.session.current_user().unwrap();
    assert_eq!(healed.full_name.as_deref(), Some("Alla Petrova"));
}
