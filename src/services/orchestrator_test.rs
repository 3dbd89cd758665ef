use super::*;
use crate::services::action::{
    ArrangeParams, ClarifyParams, CreateCircle, CreateText, DistributeParams, MoveParams, RotateParams, TargetParams,
    UndoParams,
};
use crate::services::canvas::MemoryCanvasStore;
use crate::services::chat::MemoryChatSink;
use crate::services::history::MemoryHistoryStore;
use crate::services::oracle::OfflineOracle;
use crate::services::queue::{MemoryQueueStore, enqueue};
use crate::services::selector::StructuredSelector;
use crate::state::ObjectPatch;
use crate::state::test_helpers::{circle, label, rect, stack};
use std::sync::Mutex;

// =========================================================================
// FakeOracle
// =========================================================================

/// Scripted oracle. Normalize replies are consumed in order; everything
/// else answers the same way every time.
#[derive(Default)]
struct FakeOracle {
    intent: Option<Intent>,
    normalized: Mutex<Vec<Option<Action>>>,
    plan: Option<Vec<Action>>,
    completion: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeOracle {
    fn normalizing(actions: Vec<Action>) -> Self {
        Self { normalized: Mutex::new(actions.into_iter().map(Some).collect()), ..Self::default() }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait::async_trait]
impl CommandOracle for FakeOracle {
    async fn classify(&self, _text: &str) -> Option<Intent> {
        self.record("classify");
        self.intent
    }

    async fn normalize(&self, request: &NormalizeRequest<'_>) -> Option<Action> {
        self.record(if request.anywhere { "normalize:anywhere" } else { "normalize" });
        let mut script = self.normalized.lock().unwrap();
        if script.is_empty() { None } else { script.remove(0) }
    }

    async fn plan(&self, _request: &PlanRequest<'_>) -> Option<Vec<Action>> {
        self.record("plan");
        self.plan.clone()
    }

    async fn complete(&self, system: &str, _prompt: &str) -> Option<String> {
        self.record(if system == CHAT_SYSTEM { "complete:chat" } else { "complete:ack" });
        self.completion.clone()
    }
}

/// A canvas store whose backend is down.
struct BrokenCanvas;

#[async_trait::async_trait]
impl CanvasStore for BrokenCanvas {
    async fn load(&self, canvas_id: Uuid) -> Result<Vec<CanvasObject>, StoreError> {
        Err(StoreError::NotFound(canvas_id))
    }

    async fn add_object(&self, canvas_id: Uuid, _object: CanvasObject) -> Result<(), StoreError> {
        Err(StoreError::NotFound(canvas_id))
    }

    async fn update_object(&self, canvas_id: Uuid, _object_id: Uuid, _patch: &ObjectPatch) -> Result<(), StoreError> {
        Err(StoreError::NotFound(canvas_id))
    }

    async fn put_object(&self, canvas_id: Uuid, _object: CanvasObject) -> Result<(), StoreError> {
        Err(StoreError::NotFound(canvas_id))
    }

    async fn delete_object(&self, canvas_id: Uuid, _object_id: Uuid) -> Result<(), StoreError> {
        Err(StoreError::NotFound(canvas_id))
    }

    async fn replace_all(&self, canvas_id: Uuid, _objects: &[CanvasObject]) -> Result<(), StoreError> {
        Err(StoreError::NotFound(canvas_id))
    }
}

// =========================================================================
// Harness
// =========================================================================

struct Harness {
    canvas_id: Uuid,
    user_id: Uuid,
    queue: Arc<MemoryQueueStore>,
    canvas: Arc<MemoryCanvasStore>,
    history: Arc<MemoryHistoryStore>,
    chat: Arc<MemoryChatSink>,
    orchestrator: Orchestrator,
    ctx: CanvasContext,
}

async fn harness(objects: Vec<CanvasObject>, oracle: Arc<dyn CommandOracle>) -> Harness {
    let canvas_id = Uuid::new_v4();
    let canvas = Arc::new(MemoryCanvasStore::new());
    canvas.replace_all(canvas_id, &stack(objects)).await.unwrap();
    let queue = Arc::new(MemoryQueueStore::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let chat = Arc::new(MemoryChatSink::new());
    let stores = Stores {
        queue: queue.clone(),
        history: history.clone(),
        canvas: canvas.clone(),
        chat: chat.clone(),
    };
    let orchestrator = Orchestrator::new(stores, oracle, AgentConfig::default());
    let ctx = orchestrator.context(canvas_id);
    Harness { canvas_id, user_id: Uuid::new_v4(), queue, canvas, history, chat, orchestrator, ctx }
}

impl Harness {
    /// Enqueue `text` and process it to completion.
    async fn run(&mut self, text: &str) -> QueuedCommand {
        let id = enqueue(self.queue.as_ref(), self.canvas_id, self.user_id, "ada", text)
            .await
            .unwrap();
        let processed = self.orchestrator.process_next(&mut self.ctx).await.unwrap();
        assert_eq!(processed, Some(id));
        self.queue.get(id).await.unwrap().unwrap()
    }

    async fn objects(&self) -> Vec<CanvasObject> {
        self.canvas.load(self.canvas_id).await.unwrap()
    }

    fn messages(&self) -> Vec<String> {
        self.chat.messages(self.canvas_id)
    }
}

fn text(selector: &str) -> Option<Selector> {
    Some(Selector::Text(selector.into()))
}

// =========================================================================
// CanvasContext
// =========================================================================

#[test]
fn context_keeps_a_bounded_window() {
    let mut ctx = CanvasContext::new(Uuid::new_v4(), 2);
    ctx.remember("ada", "one");
    ctx.remember("ada", "two");
    ctx.remember("assistant", "three");
    let texts: Vec<String> = ctx.recent().into_iter().map(|t| t.text).collect();
    assert_eq!(texts, vec!["two", "three"]);

    let mut silent = CanvasContext::new(Uuid::new_v4(), 0);
    silent.remember("ada", "one");
    assert!(silent.recent().is_empty());
}

// =========================================================================
// end-to-end commands
// =========================================================================

#[tokio::test(start_paused = true)]
async fn create_rectangle_completes_and_is_removed_later() {
    let mut h = harness(vec![], Arc::new(OfflineOracle)).await;
    let command = h
        .run("Create rectangle x 100, y 100, width 120, height 60 red")
        .await;
    assert_eq!(command.status, CommandStatus::Complete);
    assert_eq!(command.error_message, None);

    let objects = h.objects().await;
    assert_eq!(objects.len(), 1);
    let obj = &objects[0];
    assert_eq!(obj.kind, ObjectKind::Rectangle);
    assert_eq!((obj.x, obj.y, obj.width, obj.height), (100.0, 100.0, 120.0, 60.0));
    assert_eq!(obj.fill, "red");
    assert_eq!(obj.z_index, 1);
    assert_eq!(obj.last_modified_by, Some(h.user_id));

    assert_eq!(h.messages(), vec!["Done: created a red rectangle (120x60) at (100, 100).".to_string()]);
    assert_eq!(h.ctx.last_selection, vec![obj.id]);

    tokio::time::sleep(Duration::from_millis(AgentConfig::default().queue_display_delay_ms + 10)).await;
    tokio::task::yield_now().await;
    assert_eq!(h.queue.get(command.id).await.unwrap(), None);
}

#[tokio::test]
async fn empty_queue_processes_nothing() {
    let mut h = harness(vec![], Arc::new(OfflineOracle)).await;
    assert_eq!(h.orchestrator.process_next(&mut h.ctx).await.unwrap(), None);
}

#[tokio::test]
async fn large_delete_asks_first() {
    let circles = (0..4)
        .map(|i| circle(f64::from(i) * 100.0, 100.0, 20.0, "#EF4444"))
        .collect();
    let mut h = harness(circles, Arc::new(OfflineOracle)).await;
    let command = h.run("delete all red circles").await;

    assert_eq!(command.status, CommandStatus::Complete);
    assert_eq!(h.objects().await.len(), 4);
    assert!(h.history.entries(h.canvas_id).is_empty());
    let messages = h.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains('4'));
    assert!(messages[0].contains("yes/no"));
}

#[tokio::test]
async fn confirm_bypasses_the_guardrail() {
    let circles = (0..4)
        .map(|i| circle(f64::from(i) * 100.0, 100.0, 20.0, "#EF4444"))
        .collect();
    let oracle = FakeOracle::normalizing(vec![Action::DeleteObject(TargetParams { target: text("all red circles") })]);
    let mut h = harness(circles, Arc::new(oracle)).await;
    let command = h.run("confirm: delete all red circles").await;

    assert_eq!(command.status, CommandStatus::Complete);
    assert!(h.objects().await.is_empty());
    assert_eq!(h.history.entries(h.canvas_id).len(), 4);
    assert_eq!(h.messages(), vec!["Done: deleted 4 objects.".to_string()]);
    assert!(h.ctx.last_selection.is_empty());
}

#[tokio::test]
async fn distribute_spaces_centers_evenly() {
    let objects = vec![
        rect(0.0, 100.0, 20.0, 20.0, "#3B82F6"),
        rect(50.0, 100.0, 20.0, 20.0, "#3B82F6"),
        rect(400.0, 100.0, 20.0, 20.0, "#3B82F6"),
    ];
    let ids: Vec<Uuid> = objects.iter().map(|o| o.id).collect();
    let oracle = FakeOracle::normalizing(vec![Action::DistributeEvenly(DistributeParams {
        target: Some(Selector::Structured(StructuredSelector {
            kind: Some("rectangle".into()),
            ..StructuredSelector::default()
        })),
        direction: Axis::Horizontal,
    })]);
    let mut h = harness(objects, Arc::new(oracle)).await;
    let command = h.run("distribute the rectangles horizontally").await;
    assert_eq!(command.status, CommandStatus::Complete);

    let objects = h.objects().await;
    let x_of = |id: Uuid| objects.iter().find(|o| o.id == id).unwrap().x;
    assert_eq!((x_of(ids[0]), x_of(ids[1]), x_of(ids[2])), (0.0, 200.0, 400.0));
    assert_eq!(h.messages(), vec!["Done: distributed 3 objects horizontally.".to_string()]);
}

#[tokio::test]
async fn create_move_then_undo_two() {
    let oracle = FakeOracle::normalizing(vec![
        Action::CreateCircle(CreateCircle { x: Some(100.0), y: Some(100.0), radius: Some(30.0), fill: None }),
        Action::MoveObject(MoveParams { target: text("it"), x: Some(300.0), y: Some(300.0), ..MoveParams::default() }),
        Action::Undo(UndoParams { count: Some(2) }),
    ]);
    let mut h = harness(vec![], Arc::new(oracle)).await;

    h.run("add a circle").await;
    let created = h.objects().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].fill, DEFAULT_FILL);

    h.run("move it to 300, 300").await;
    let moved = h.objects().await;
    assert_eq!((moved[0].x, moved[0].y), (300.0, 300.0));

    h.run("undo twice").await;
    assert!(h.objects().await.is_empty());
    let messages = h.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2], "Undid the last 2 changes.");
}

#[tokio::test]
async fn multi_target_move_keeps_formation() {
    let objects = vec![rect(100.0, 100.0, 20.0, 20.0, "#EF4444"), rect(150.0, 130.0, 20.0, 20.0, "#EF4444")];
    let ids: Vec<Uuid> = objects.iter().map(|o| o.id).collect();
    let oracle = FakeOracle::normalizing(vec![Action::MoveObject(MoveParams {
        target: text("the red rectangles"),
        x: Some(500.0),
        y: Some(400.0),
        ..MoveParams::default()
    })]);
    let mut h = harness(objects, Arc::new(oracle)).await;
    h.run("move the red rectangles to 500, 400").await;

    let objects = h.objects().await;
    let pos = |id: Uuid| {
        let o = objects.iter().find(|o| o.id == id).unwrap();
        (o.x, o.y)
    };
    assert_eq!(pos(ids[0]), (500.0, 400.0));
    assert_eq!(pos(ids[1]), (550.0, 430.0));
    assert_eq!(h.ctx.last_selection, ids);
}

#[tokio::test]
async fn validation_errors_are_posted_verbatim() {
    let oracle = FakeOracle::normalizing(vec![Action::CreateRectangle(CreateShape {
        width: Some(2.0),
        height: Some(50.0),
        ..CreateShape::default()
    })]);
    let mut h = harness(vec![], Arc::new(oracle)).await;
    let command = h.run("make a very thin rectangle").await;

    assert_eq!(command.status, CommandStatus::Complete);
    assert!(h.objects().await.is_empty());
    let messages = h.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("width must be at least 10px"), "{messages:?}");
}

#[tokio::test]
async fn store_failure_marks_the_command_failed() {
    let canvas_id = Uuid::new_v4();
    let queue = Arc::new(MemoryQueueStore::new());
    let chat = Arc::new(MemoryChatSink::new());
    let stores = Stores {
        queue: queue.clone(),
        history: Arc::new(MemoryHistoryStore::new()),
        canvas: Arc::new(BrokenCanvas),
        chat: chat.clone(),
    };
    let orchestrator = Orchestrator::new(stores, Arc::new(OfflineOracle), AgentConfig::default());
    let mut ctx = orchestrator.context(canvas_id);

    let id = enqueue(queue.as_ref(), canvas_id, Uuid::new_v4(), "ada", "delete everything")
        .await
        .unwrap();
    orchestrator.process_next(&mut ctx).await.unwrap();

    let command = queue.get(id).await.unwrap().unwrap();
    assert_eq!(command.status, CommandStatus::Failed);
    assert!(command.error_message.is_some());
    let messages = chat.messages(canvas_id);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Sorry, something went wrong"));
}

#[tokio::test]
async fn uninterpretable_command_is_a_silent_no_op() {
    let oracle = Arc::new(FakeOracle::default());
    let mut h = harness(vec![rect(0.0, 0.0, 50.0, 50.0, "red")], oracle.clone()).await;
    let command = h.run("nice work everyone").await;

    assert_eq!(command.status, CommandStatus::Complete);
    assert!(h.messages().is_empty());
    assert_eq!(h.objects().await.len(), 1);
    assert_eq!(oracle.calls(), vec!["classify", "normalize"]);
}

#[tokio::test]
async fn conversational_reply_goes_to_chat() {
    let oracle = Arc::new(FakeOracle {
        intent: Some(Intent::Conversational),
        completion: Some("Hi! Ask me to draw something.".into()),
        ..FakeOracle::default()
    });
    let mut h = harness(vec![], oracle.clone()).await;
    h.run("hello there").await;

    assert_eq!(h.messages(), vec!["Hi! Ask me to draw something.".to_string()]);
    assert_eq!(oracle.calls(), vec!["classify", "complete:chat"]);
}

#[tokio::test]
async fn conversational_command_still_runs_when_parseable() {
    let oracle = Arc::new(FakeOracle { intent: Some(Intent::Conversational), ..FakeOracle::default() });
    let mut h = harness(vec![], oracle).await;
    h.run("help").await;
    let messages = h.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("I can change the canvas"));
}

#[tokio::test]
async fn conversational_question_about_deleting_deletes_nothing() {
    let oracle = Arc::new(FakeOracle {
        intent: Some(Intent::Conversational),
        completion: Some("Say \"delete everything\" and I will.".into()),
        ..FakeOracle::default()
    });
    let shapes = vec![rect(0.0, 0.0, 50.0, 50.0, "red"), rect(100.0, 0.0, 50.0, 50.0, "blue")];
    let mut h = harness(shapes, oracle.clone()).await;
    h.run("delete all shapes?").await;

    assert_eq!(h.objects().await.len(), 2);
    assert!(h.history.entries(h.canvas_id).is_empty());
    assert_eq!(oracle.calls(), vec!["classify", "complete:chat"]);
}

#[tokio::test]
async fn quoted_text_is_created_not_obeyed() {
    let mut h = harness(vec![rect(0.0, 0.0, 50.0, 50.0, "red")], Arc::new(OfflineOracle)).await;
    let command = h.run(r#"add text "remove old items""#).await;

    assert_eq!(command.status, CommandStatus::Complete);
    let objects = h.objects().await;
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].kind, ObjectKind::Rectangle);
    assert_eq!(objects[1].kind, ObjectKind::Text);
    assert_eq!(objects[1].text.as_deref(), Some("remove old items"));
}

#[tokio::test]
async fn plan_targets_objects_it_created() {
    let oracle = Arc::new(FakeOracle {
        intent: Some(Intent::Complex),
        plan: Some(vec![
            Action::CreateRectangle(CreateShape {
                x: Some(100.0),
                y: Some(100.0),
                width: Some(200.0),
                height: Some(40.0),
                ..CreateShape::default()
            }),
            Action::CreateText(CreateText { x: Some(120.0), y: Some(110.0), text: "Login".into(), ..CreateText::default() }),
            Action::ArrangeVertical(ArrangeParams { target: None, spacing: Some(10.0) }),
        ]),
        completion: Some("Built a login header.".into()),
        ..FakeOracle::default()
    });
    // A bystander on screen must not be pulled into the arrangement.
    let bystander = rect(900.0, 600.0, 50.0, 50.0, "green");
    let bystander_id = bystander.id;
    let mut h = harness(vec![bystander], oracle.clone()).await;
    h.run("make a login header").await;

    let objects = h.objects().await;
    assert_eq!(objects.len(), 3);
    let kept = objects.iter().find(|o| o.id == bystander_id).unwrap();
    assert_eq!((kept.x, kept.y), (900.0, 600.0));

    let mut made: Vec<&CanvasObject> = objects.iter().filter(|o| o.id != bystander_id).collect();
    made.sort_by(|a, b| a.y.total_cmp(&b.y));
    assert!((made[1].y - (made[0].y + made[0].height + 10.0)).abs() < 1e-9);

    assert_eq!(h.messages(), vec!["Built a login header.".to_string()]);
    assert_eq!(oracle.calls(), vec!["classify", "plan", "complete:ack"]);
    assert_eq!(h.ctx.last_selection.len(), 2);
}

#[tokio::test]
async fn empty_plan_falls_back_to_normalizer() {
    let oracle = Arc::new(FakeOracle {
        intent: Some(Intent::Complex),
        plan: Some(vec![]),
        normalized: Mutex::new(vec![Some(Action::Help {})]),
        ..FakeOracle::default()
    });
    let mut h = harness(vec![], oracle.clone()).await;
    h.run("do something elaborate").await;
    assert_eq!(oracle.calls(), vec!["classify", "plan", "normalize"]);
    assert_eq!(h.messages().len(), 1);
}

#[tokio::test]
async fn pronoun_uses_last_selection() {
    let a = rect(100.0, 100.0, 50.0, 50.0, "red");
    let b = rect(300.0, 100.0, 50.0, 50.0, "red");
    let b_id = b.id;
    let oracle = FakeOracle::normalizing(vec![Action::RotateObject(RotateParams {
        target: text("it"),
        rotation: Some(405.0),
    })]);
    let mut h = harness(vec![a, b], Arc::new(oracle)).await;
    h.ctx.last_selection = vec![b_id];
    h.run("rotate it 405 degrees").await;

    for obj in h.objects().await {
        let expected = if obj.id == b_id { 45.0 } else { 0.0 };
        assert_eq!(obj.rotation, expected);
    }
}

#[tokio::test]
async fn missing_target_asks_which_objects() {
    let oracle = FakeOracle::normalizing(vec![Action::DeleteObject(TargetParams::default())]);
    let mut h = harness(vec![rect(0.0, 0.0, 50.0, 50.0, "red")], Arc::new(oracle)).await;
    h.run("delete").await;
    assert_eq!(h.objects().await.len(), 1);
    let messages = h.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Which objects should I delete?"));
}

#[tokio::test]
async fn selector_miss_suggests_anywhere() {
    let offscreen = circle(3000.0, 3000.0, 20.0, "purple");
    let oracle = Arc::new(FakeOracle::normalizing(vec![
        Action::DeleteObject(TargetParams { target: text("the purple circle") }),
        Action::DeleteObject(TargetParams { target: text("the purple circle") }),
    ]));
    let mut h = harness(vec![offscreen], oracle.clone()).await;

    h.run("delete the purple circle").await;
    assert_eq!(h.objects().await.len(), 1);
    assert!(h.messages()[0].contains("\"anywhere\""));

    h.run("delete the purple circle anywhere").await;
    assert!(h.objects().await.is_empty());
    assert!(oracle.calls().contains(&"normalize:anywhere".to_string()));
}

#[tokio::test]
async fn clarification_stops_the_plan() {
    let oracle = Arc::new(FakeOracle {
        intent: Some(Intent::Complex),
        plan: Some(vec![
            Action::Clarify(ClarifyParams { question: "Which color should the boxes be?".into(), missing: None }),
            Action::CreateRectangle(CreateShape::default()),
        ]),
        ..FakeOracle::default()
    });
    let mut h = harness(vec![], oracle).await;
    h.run("make some boxes").await;
    assert!(h.objects().await.is_empty());
    assert_eq!(h.messages(), vec!["Which color should the boxes be?".to_string()]);
}

#[tokio::test]
async fn large_resize_asks_unless_confirmed() {
    let small = rect(100.0, 100.0, 50.0, 50.0, "red");
    let id = small.id;
    let resize = Action::ResizeObject(ResizeParams { target: text("the red box"), scale: Some(5.0), ..ResizeParams::default() });
    let oracle = FakeOracle::normalizing(vec![resize.clone(), resize]);
    let mut h = harness(vec![small], Arc::new(oracle)).await;

    h.run("make the red box five times bigger").await;
    assert_eq!(h.objects().await[0].width, 50.0);
    assert!(h.messages()[0].contains("yes/no"));

    h.run("make the red box five times bigger, confirm").await;
    let obj = h.objects().await.into_iter().find(|o| o.id == id).unwrap();
    assert_eq!((obj.width, obj.height), (250.0, 250.0));
}

#[tokio::test]
async fn chat_turns_reach_the_context() {
    let mut h = harness(vec![], Arc::new(OfflineOracle)).await;
    h.run("help").await;
    let recent = h.ctx.recent();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0], ChatTurn { author: "ada".into(), text: "help".into() });
    assert_eq!(recent[1].author, "assistant");
}

// =========================================================================
// consumer
// =========================================================================

#[tokio::test]
async fn consumer_drains_until_shutdown() {
    let h = harness(vec![], Arc::new(OfflineOracle)).await;
    let orchestrator = Arc::new(h.orchestrator);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = spawn_canvas_consumer(orchestrator, h.canvas_id, shutdown_rx);

    enqueue(h.queue.as_ref(), h.canvas_id, h.user_id, "ada", "add a circle radius 30")
        .await
        .unwrap();
    enqueue(h.queue.as_ref(), h.canvas_id, h.user_id, "ada", "draw a purple circle radius 20")
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.canvas.load(h.canvas_id).await.unwrap().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.chat.messages(h.canvas_id).len(), 2);
}

// =========================================================================
// sizing helpers
// =========================================================================

#[test]
fn shape_size_honours_aspect_ratio() {
    let size = |width, height, aspect_ratio| shape_size(&CreateShape { width, height, aspect_ratio, ..CreateShape::default() });
    assert_eq!(size(None, None, None), (DEFAULT_RECT_WIDTH, DEFAULT_RECT_HEIGHT));
    assert_eq!(size(Some(200.0), Some(50.0), Some(2.0)), (200.0, 50.0));
    assert_eq!(size(Some(200.0), None, Some(2.0)), (200.0, 100.0));
    assert_eq!(size(None, Some(90.0), Some(2.0)), (180.0, 90.0));
    assert_eq!(size(None, None, Some(2.0)), (160.0, DEFAULT_RECT_HEIGHT));
    assert_eq!(size(None, None, Some(-1.0)), (DEFAULT_RECT_WIDTH, DEFAULT_RECT_HEIGHT));
}

#[test]
fn resize_plans_per_kind() {
    let params = |f: fn(&mut ResizeParams)| {
        let mut p = ResizeParams::default();
        f(&mut p);
        p
    };

    let c = circle(0.0, 0.0, 20.0, "red");
    assert_eq!(plan_resize(&c, &params(|p| p.scale = Some(2.0))), Some(Resize::Radius(40.0)));
    assert_eq!(plan_resize(&c, &params(|p| p.width = Some(100.0))), Some(Resize::Radius(50.0)));

    let t = label(0.0, 0.0, "hi", 20.0);
    assert_eq!(plan_resize(&t, &params(|p| p.scale = Some(1.5))), Some(Resize::Font(30.0)));
    let Some(Resize::Font(size)) = plan_resize(&t, &params(|p| p.height = Some(36.0))) else {
        panic!("expected a font resize");
    };
    assert!((size - 30.0).abs() < 1e-9);

    let r = rect(0.0, 0.0, 100.0, 50.0, "red");
    assert_eq!(plan_resize(&r, &params(|p| p.width = Some(300.0))), Some(Resize::Box(300.0, 50.0)));
    assert_eq!(plan_resize(&r, &params(|p| p.scale = Some(0.5))), Some(Resize::Box(50.0, 25.0)));
    assert_eq!(plan_resize(&r, &params(|p| p.radius = Some(30.0))), Some(Resize::Box(60.0, 60.0)));
    assert_eq!(plan_resize(&r, &ResizeParams::default()), None);
}

#[test]
fn tally_reports_partial_success() {
    let ok = ToolResult::ok(None);
    let bad = ToolResult { success: false, object_id: None, error: Some("nope".into()) };
    assert_eq!(tally(&[ok.clone(), ok.clone()], "moved 2 objects".into()), Step::Done("moved 2 objects".into()));
    assert_eq!(tally(&[ok, bad.clone(), bad], "x".into()), Step::Failed("nope (1 of 3 succeeded)".into()));
}
