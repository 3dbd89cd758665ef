//! Orchestrator — one queued chat command in, canvas mutations and one reply out.
//!
//! DESIGN
//! ======
//! A consumer per canvas claims the oldest queued command and runs it
//! through a single pipeline:
//!
//!   classify → plan (complex) → normalize → regex fallback
//!            → resolve selectors → guardrail → execute → reply
//!
//! Each strategy only runs when the one before it produced nothing. Every
//! action of a plan goes through the same resolution, guardrail and executor
//! path as a single action.
//!
//! Validation failures come back from the executor as values and are posted
//! to chat verbatim. Only store failures escape; they mark the command
//! `failed` and post a short failure message. A command nothing could
//! interpret is a silent no-op that still completes.
//!
//! Conversation and selection memory live in a `CanvasContext` owned by the
//! consumer, so canvases never share state.

use std::collections::VecDeque;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::StoreError;
use super::action::{Action, CreateShape, ResizeParams};
use super::canvas::CanvasStore;
use super::chat::ChatSink;
use super::executor::{Scope, TEXT_LINE_HEIGHT, ToolExecutor, ToolResult, text_box};
use super::fallback;
use super::guardrail::{self, Guardrail};
use super::history::{HistoryStore, UndoLedger};
use super::layout::Axis;
use super::oracle::{ACK_SYSTEM, CHAT_SYSTEM, ChatTurn, CommandOracle, Intent, NormalizeRequest, PlanRequest};
use super::queue::{CommandStatus, QueueStore, QueuedCommand, schedule_removal};
use super::selector::{Selector, SelectorResolver};
use crate::config::{
    AgentConfig, DEFAULT_CIRCLE_RADIUS, DEFAULT_FILL, DEFAULT_FONT_SIZE, DEFAULT_RECT_HEIGHT, DEFAULT_RECT_WIDTH,
    DEFAULT_SPACING, DEFAULT_TEXT_FILL,
};
use crate::error::ErrorCode;
use crate::state::{CanvasObject, ObjectKind, Viewport};

/// Objects listed in the visible summary sent to the model.
const SUMMARY_LIMIT: usize = 50;

/// Author name used for the agent's own turns in the message window.
const ASSISTANT_NAME: &str = "assistant";

static ANYWHERE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\banywhere\b").expect("valid regex"));

const HELP_TEXT: &str = "I can change the canvas for you. Try:\n\
     - \"create a red rectangle 200x100 at 100, 100\", \"add a circle radius 40\", \"add text \\\"Hello\\\"\"\n\
     - \"move the blue square to 300, 200\", \"move it left 50\"\n\
     - \"resize the circle to radius 80\", \"make the text twice as big\", \"rotate the box 45 degrees\"\n\
     - \"arrange the circles in a row\", \"arrange everything in a grid with 3 columns\", \"distribute the squares vertically\"\n\
     - \"delete the red circles\", \"undo\", \"undo the last 3\"\n\
     I only look at what is on screen unless you say \"anywhere\". Risky changes ask first; \
     repeat the request with \"confirm\" to go ahead.";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("command {0} is no longer executing")]
    NotExecuting(Uuid),
}

impl ErrorCode for OrchestratorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.error_code(),
            Self::NotExecuting(_) => "E_NOT_EXECUTING",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable(),
            Self::NotExecuting(_) => false,
        }
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Per-canvas memory threaded through the pipeline.
#[derive(Debug, Clone)]
pub struct CanvasContext {
    pub canvas_id: Uuid,
    pub viewport: Viewport,
    /// Objects the previous command created or acted on; pronouns resolve here.
    pub last_selection: Vec<Uuid>,
    messages: VecDeque<ChatTurn>,
    window: usize,
}

impl CanvasContext {
    #[must_use]
    pub fn new(canvas_id: Uuid, window: usize) -> Self {
        Self {
            canvas_id,
            viewport: Viewport::default(),
            last_selection: Vec::new(),
            messages: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Append a chat turn, dropping the oldest beyond the window.
    pub fn remember(&mut self, author: &str, text: &str) {
        if self.window == 0 {
            return;
        }
        while self.messages.len() >= self.window {
            self.messages.pop_front();
        }
        self.messages.push_back(ChatTurn { author: author.to_string(), text: text.to_string() });
    }

    /// The message window, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<ChatTurn> {
        self.messages.iter().cloned().collect()
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// The collaborators an orchestrator runs against.
#[derive(Clone)]
pub struct Stores {
    pub queue: Arc<dyn QueueStore>,
    pub history: Arc<dyn HistoryStore>,
    pub canvas: Arc<dyn CanvasStore>,
    pub chat: Arc<dyn ChatSink>,
}

pub struct Orchestrator {
    queue: Arc<dyn QueueStore>,
    canvas: Arc<dyn CanvasStore>,
    chat: Arc<dyn ChatSink>,
    oracle: Arc<dyn CommandOracle>,
    executor: ToolExecutor,
    ledger: UndoLedger,
    guardrail: Guardrail,
    config: AgentConfig,
}

/// Result of one action.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    /// Mutations applied; the text summarises them for the acknowledgement.
    Done(String),
    /// Informational reply that needs no acknowledgement (help, undo).
    Say(String),
    /// The executor rejected the change.
    Failed(String),
    /// Ask the user something and run nothing further.
    Stop(String),
}

/// What one command produced, in execution order.
#[derive(Debug, Default)]
struct Outcome {
    done: Vec<String>,
    said: Vec<String>,
    failed: Vec<String>,
    stopped: Option<String>,
}

/// Per-command state while executing a list of actions.
struct Run {
    scope: Scope,
    anywhere: bool,
    confirmed: bool,
    created: Vec<Uuid>,
}

enum Interpretation {
    Actions(Vec<Action>),
    Chat,
}

/// How a single target should be resized.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Resize {
    Box(f64, f64),
    Radius(f64),
    Font(f64),
}

impl Orchestrator {
    #[must_use]
    pub fn new(stores: Stores, oracle: Arc<dyn CommandOracle>, config: AgentConfig) -> Self {
        let executor = ToolExecutor::new(stores.canvas.clone(), stores.history.clone(), config);
        let ledger = UndoLedger::new(stores.history, stores.canvas.clone());
        Self {
            queue: stores.queue,
            canvas: stores.canvas,
            chat: stores.chat,
            oracle,
            executor,
            ledger,
            guardrail: Guardrail::new(&config),
            config,
        }
    }

    #[must_use]
    pub fn context(&self, canvas_id: Uuid) -> CanvasContext {
        CanvasContext::new(canvas_id, self.config.recent_message_window)
    }

    fn screen(&self) -> (f64, f64) {
        (self.config.viewport_width, self.config.viewport_height)
    }

    // -------------------------------------------------------------------------
    // queue handling
    // -------------------------------------------------------------------------

    /// Claim and run the oldest queued command of the context's canvas.
    /// Returns `None` when nothing is queued.
    ///
    /// # Errors
    ///
    /// Store failures while reading or claiming. Failures inside the command
    /// are recorded on the command instead.
    pub async fn process_next(&self, ctx: &mut CanvasContext) -> Result<Option<Uuid>, OrchestratorError> {
        let Some(command) = self.queue.list_queued(ctx.canvas_id, 1).await?.into_iter().next() else {
            return Ok(None);
        };
        if !self
            .queue
            .transition(command.id, CommandStatus::Queued, CommandStatus::Executing, None)
            .await?
        {
            info!(canvas_id = %ctx.canvas_id, command_id = %command.id, "orchestrator: claim lost");
            return Ok(Some(command.id));
        }
        self.process(ctx, &command).await;
        Ok(Some(command.id))
    }

    /// Run one already-claimed command to a terminal status.
    pub async fn process(&self, ctx: &mut CanvasContext, command: &QueuedCommand) {
        let canvas_id = command.canvas_id;
        info!(%canvas_id, command_id = %command.id, user_id = %command.user_id, "orchestrator: command started");

        let result = self.run_command(ctx, command).await;
        ctx.remember(&command.display_name, &command.text);

        let (status, error_message) = match result {
            Ok(reply) => {
                if let Some(reply) = reply {
                    self.post(canvas_id, &reply).await;
                    ctx.remember(ASSISTANT_NAME, &reply);
                }
                (CommandStatus::Complete, None)
            }
            Err(e) => {
                error!(%canvas_id, command_id = %command.id, error = %e, code = e.error_code(), "orchestrator: command failed");
                self.post(canvas_id, &format!("Sorry, something went wrong running \"{}\": {e}", command.text))
                    .await;
                (CommandStatus::Failed, Some(e.to_string()))
            }
        };

        if let Err(e) = self.finish(command.id, status, error_message.as_deref()).await {
            warn!(%canvas_id, command_id = %command.id, error = %e, "orchestrator: terminal transition failed");
        }
        schedule_removal(
            self.queue.clone(),
            command.id,
            Duration::from_millis(self.config.queue_display_delay_ms),
        );
        info!(%canvas_id, command_id = %command.id, status = status.as_str(), "orchestrator: command finished");
    }

    async fn finish(&self, id: Uuid, status: CommandStatus, error_message: Option<&str>) -> Result<(), OrchestratorError> {
        if self
            .queue
            .transition(id, CommandStatus::Executing, status, error_message)
            .await?
        {
            Ok(())
        } else {
            Err(OrchestratorError::NotExecuting(id))
        }
    }

    async fn post(&self, canvas_id: Uuid, text: &str) {
        if let Err(e) = self.chat.post_assistant_message(canvas_id, text).await {
            warn!(%canvas_id, error = %e, "orchestrator: chat post failed");
        }
    }

    // -------------------------------------------------------------------------
    // pipeline
    // -------------------------------------------------------------------------

    async fn run_command(
        &self,
        ctx: &mut CanvasContext,
        command: &QueuedCommand,
    ) -> Result<Option<String>, OrchestratorError> {
        let text = command.text.trim();
        let mut run = Run {
            scope: Scope { canvas_id: command.canvas_id, actor: command.user_id },
            anywhere: ANYWHERE_RE.is_match(text),
            confirmed: guardrail::is_confirmed(text),
            created: Vec::new(),
        };

        let actions = match self.interpret(ctx, text, run.anywhere).await? {
            Interpretation::Actions(actions) => actions,
            Interpretation::Chat => {
                let prompt = format!("<user_input>{text}</user_input>");
                return Ok(self.oracle.complete(CHAT_SYSTEM, &prompt).await);
            }
        };
        if actions.is_empty() {
            info!(canvas_id = %ctx.canvas_id, command_id = %command.id, "orchestrator: nothing to do");
            return Ok(None);
        }

        let mut outcome = Outcome::default();
        for action in &actions {
            let step = self.execute(ctx, &mut run, action).await?;
            info!(canvas_id = %ctx.canvas_id, command_id = %command.id, action = action.name(), ?step, "orchestrator: step");
            match step {
                Step::Done(summary) => outcome.done.push(summary),
                Step::Say(text) => outcome.said.push(text),
                Step::Failed(error) => outcome.failed.push(error),
                Step::Stop(question) => {
                    outcome.stopped = Some(question);
                    break;
                }
            }
        }
        Ok(Some(self.reply(text, outcome).await))
    }

    async fn interpret(
        &self,
        ctx: &CanvasContext,
        text: &str,
        anywhere: bool,
    ) -> Result<Interpretation, OrchestratorError> {
        let canvas_id = ctx.canvas_id;
        let intent = self.oracle.classify(text).await.unwrap_or(Intent::Simple);
        info!(%canvas_id, ?intent, anywhere, "orchestrator: classified");

        // Chatter only ever runs help or undo; anything else gets a reply.
        if intent == Intent::Conversational {
            return Ok(match fallback::parse(text) {
                Some(action @ (Action::Help {} | Action::Undo(_))) => Interpretation::Actions(vec![action]),
                _ => Interpretation::Chat,
            });
        }

        let objects = self.canvas.load(canvas_id).await?;
        let resolver = SelectorResolver::new(&objects, &ctx.viewport, self.screen(), &ctx.last_selection);
        let summary = resolver.visible_summary(SUMMARY_LIMIT);
        let recent = ctx.recent();

        if intent == Intent::Complex {
            let request = PlanRequest {
                text,
                recent: &recent,
                visible_summary: &summary,
                viewport: &ctx.viewport,
                objects: &objects,
            };
            if let Some(plan) = self.oracle.plan(&request).await.filter(|p| !p.is_empty()) {
                return Ok(Interpretation::Actions(plan));
            }
            warn!(%canvas_id, "orchestrator: no plan; trying normalizer");
        }

        let request = NormalizeRequest { text, recent: &recent, visible_summary: &summary, viewport: &ctx.viewport, anywhere };
        if let Some(action) = self.oracle.normalize(&request).await {
            return Ok(Interpretation::Actions(vec![action]));
        }

        let fallback = fallback::parse(text);
        if fallback.is_some() {
            info!(%canvas_id, "orchestrator: using fallback parser");
        }
        Ok(Interpretation::Actions(fallback.into_iter().collect()))
    }

    async fn reply(&self, text: &str, outcome: Outcome) -> String {
        let mut parts = Vec::new();
        if !outcome.done.is_empty() {
            parts.push(self.acknowledge(text, &outcome.done).await);
        }
        parts.extend(outcome.said);
        if !outcome.failed.is_empty() {
            parts.push(format!("I couldn't do all of that: {}", outcome.failed.join("; ")));
        }
        parts.extend(outcome.stopped);
        parts.join("\n")
    }

    async fn acknowledge(&self, text: &str, done: &[String]) -> String {
        let prompt = format!("The user asked: <user_input>{text}</user_input>\nCompleted:\n- {}", done.join("\n- "));
        match self.oracle.complete(ACK_SYSTEM, &prompt).await {
            Some(reply) => reply,
            None => format!("Done: {}.", done.join("; ")),
        }
    }

    // -------------------------------------------------------------------------
    // execution
    // -------------------------------------------------------------------------

    async fn execute(&self, ctx: &mut CanvasContext, run: &mut Run, action: &Action) -> Result<Step, OrchestratorError> {
        let scope = run.scope;
        let center = (ctx.viewport.center_x, ctx.viewport.center_y);

        let step = match action {
            Action::CreateRectangle(shape) | Action::CreateEllipse(shape) => {
                let (width, height) = shape_size(shape);
                let x = shape.x.unwrap_or(center.0 - width / 2.0);
                let y = shape.y.unwrap_or(center.1 - height / 2.0);
                let fill = shape.fill.as_deref().unwrap_or(DEFAULT_FILL);
                let (result, noun) = if matches!(action, Action::CreateEllipse(_)) {
                    (self.executor.create_ellipse(scope, x, y, width, height, fill).await?, "ellipse")
                } else {
                    (self.executor.create_rectangle(scope, x, y, width, height, fill).await?, "rectangle")
                };
                created(ctx, run, &result, format!("created a {fill} {noun} ({width:.0}x{height:.0}) at ({x:.0}, {y:.0})"))
            }
            Action::CreateCircle(circle) => {
                let radius = circle.radius.unwrap_or(DEFAULT_CIRCLE_RADIUS);
                let x = circle.x.unwrap_or(center.0 - radius);
                let y = circle.y.unwrap_or(center.1 - radius);
                let fill = circle.fill.as_deref().unwrap_or(DEFAULT_FILL);
                let result = self.executor.create_circle(scope, x, y, radius, fill).await?;
                created(ctx, run, &result, format!("created a {fill} circle (radius {radius:.0}) at ({x:.0}, {y:.0})"))
            }
            Action::CreateText(params) => {
                let font_size = params.font_size.unwrap_or(DEFAULT_FONT_SIZE);
                let (width, height) = text_box(&params.text, font_size);
                let x = params.x.unwrap_or(center.0 - width / 2.0);
                let y = params.y.unwrap_or(center.1 - height / 2.0);
                let fill = params.fill.as_deref().unwrap_or(DEFAULT_TEXT_FILL);
                let result = self
                    .executor
                    .create_text(scope, x, y, &params.text, font_size, fill)
                    .await?;
                created(ctx, run, &result, format!("added text \"{}\" at ({x:.0}, {y:.0})", params.text))
            }
            Action::Undo(params) => {
                let count = params.count.unwrap_or(1).max(1);
                let report = self.ledger.undo_last_n(scope.canvas_id, count).await?;
                ctx.last_selection.clear();
                let mut text = match report.entries.len() {
                    0 => "There is nothing to undo.".to_string(),
                    1 => "Undid the last change.".to_string(),
                    n => format!("Undid the last {n} changes."),
                };
                if !report.skipped.is_empty() {
                    text.push_str(&format!(" {} object(s) could not be restored.", report.skipped.len()));
                }
                Step::Say(text)
            }
            Action::Help {} => Step::Say(HELP_TEXT.to_string()),
            Action::Clarify(params) => {
                let question = params.question.trim();
                Step::Stop(if question.is_empty() {
                    "Could you tell me a bit more about what you want to change?".to_string()
                } else {
                    question.to_string()
                })
            }
            _ => self.execute_targeted(ctx, run, action).await?,
        };
        Ok(step)
    }

    async fn execute_targeted(
        &self,
        ctx: &mut CanvasContext,
        run: &Run,
        action: &Action,
    ) -> Result<Step, OrchestratorError> {
        let scope = run.scope;
        let objects = self.canvas.load(scope.canvas_id).await?;
        let ids = match self.resolve_targets(ctx, run, &objects, action) {
            Ok(ids) => ids,
            Err(question) => return Ok(Step::Stop(question)),
        };
        let targets: Vec<&CanvasObject> = ids
            .iter()
            .filter_map(|id| objects.iter().find(|o| o.id == *id))
            .collect();
        let count = ids.len();

        let step = match action {
            Action::MoveObject(params) => {
                let left = targets.iter().map(|o| o.x).fold(f64::INFINITY, f64::min);
                let top = targets.iter().map(|o| o.y).fold(f64::INFINITY, f64::min);
                let (dx, dy) = if params.x.is_some() || params.y.is_some() {
                    (params.x.map_or(0.0, |x| x - left), params.y.map_or(0.0, |y| y - top))
                } else if params.dx.is_some() || params.dy.is_some() {
                    (params.dx.unwrap_or(0.0), params.dy.unwrap_or(0.0))
                } else {
                    return Ok(Step::Stop(
                        "Where should I move it? Give a position like \"to 300, 200\" or a direction like \"left 50\"."
                            .into(),
                    ));
                };
                if !run.confirmed {
                    if let Some(question) = self.guardrail.check_move(&ids, &objects, (left + dx, top + dy)) {
                        return Ok(Step::Stop(question));
                    }
                }
                let mut results = Vec::with_capacity(count);
                for obj in &targets {
                    results.push(self.executor.move_object(scope, obj.id, obj.x + dx, obj.y + dy).await?);
                }
                tally(&results, format!("moved {}", objects_phrase(count)))
            }
            Action::ResizeObject(params) => {
                let mut planned = Vec::with_capacity(count);
                for obj in &targets {
                    let Some(resize) = plan_resize(obj, params) else {
                        return Ok(Step::Stop(
                            "How big should it be? Give a size like \"200x100\", \"radius 40\" or \"twice as big\"."
                                .into(),
                        ));
                    };
                    planned.push((*obj, resize));
                }
                if !run.confirmed {
                    for (obj, resize) in &planned {
                        let (width, height) = resize.dimensions(obj);
                        if let Some(question) = self.guardrail.check_resize(&[*obj], Some(width), Some(height)) {
                            return Ok(Step::Stop(question));
                        }
                    }
                }
                let mut results = Vec::with_capacity(count);
                for (obj, resize) in planned {
                    let result = match resize {
                        Resize::Box(width, height) => self.executor.resize_object(scope, obj.id, width, height).await?,
                        Resize::Radius(radius) => self.executor.resize_circle(scope, obj.id, radius).await?,
                        Resize::Font(size) => self.executor.resize_text(scope, obj.id, size).await?,
                    };
                    results.push(result);
                }
                tally(&results, format!("resized {}", objects_phrase(count)))
            }
            Action::RotateObject(params) => {
                let Some(degrees) = params.rotation else {
                    return Ok(Step::Stop("How many degrees should I rotate it?".into()));
                };
                let mut results = Vec::with_capacity(count);
                for id in &ids {
                    results.push(self.executor.rotate_object(scope, *id, degrees).await?);
                }
                tally(&results, format!("rotated {} to {degrees:.0}°", objects_phrase(count)))
            }
            Action::DeleteObject(_) => {
                if !run.confirmed {
                    if let Some(question) = self.guardrail.check_delete(count) {
                        return Ok(Step::Stop(question));
                    }
                }
                let mut results = Vec::with_capacity(count);
                for id in &ids {
                    results.push(self.executor.delete_object(scope, *id).await?);
                }
                tally(&results, format!("deleted {}", objects_phrase(count)))
            }
            Action::ArrangeHorizontal(params) => {
                let spacing = params.spacing.unwrap_or(DEFAULT_SPACING);
                let result = self.executor.arrange_horizontal(scope, &ids, spacing).await?;
                tally(&[result], format!("arranged {} in a row", objects_phrase(count)))
            }
            Action::ArrangeVertical(params) => {
                let spacing = params.spacing.unwrap_or(DEFAULT_SPACING);
                let result = self.executor.arrange_vertical(scope, &ids, spacing).await?;
                tally(&[result], format!("stacked {} in a column", objects_phrase(count)))
            }
            Action::ArrangeGrid(params) => {
                let spacing = params.spacing.unwrap_or(DEFAULT_SPACING);
                let result = self
                    .executor
                    .arrange_grid(scope, &ids, params.columns.filter(|c| *c > 0), spacing)
                    .await?;
                tally(&[result], format!("arranged {} in a grid", objects_phrase(count)))
            }
            Action::DistributeEvenly(params) => {
                let result = self
                    .executor
                    .distribute_evenly(scope, &ids, params.direction)
                    .await?;
                let axis = match params.direction {
                    Axis::Horizontal => "horizontally",
                    Axis::Vertical => "vertically",
                };
                tally(&[result], format!("distributed {} {axis}", objects_phrase(count)))
            }
            _ => return Ok(Step::Stop("I'm not sure what to do with that.".into())),
        };

        if matches!(step, Step::Done(_)) {
            if matches!(action, Action::DeleteObject(_)) {
                ctx.last_selection.clear();
            } else {
                ctx.last_selection = ids;
            }
        }
        Ok(step)
    }

    /// Target ids for `action`, or a question for the user when there are none.
    fn resolve_targets(
        &self,
        ctx: &CanvasContext,
        run: &Run,
        objects: &[CanvasObject],
        action: &Action,
    ) -> Result<Vec<Uuid>, String> {
        let resolver = SelectorResolver::new(objects, &ctx.viewport, self.screen(), &ctx.last_selection);
        if let Some(selector) = action.target() {
            let ids = resolver.resolve(selector, !run.anywhere);
            if ids.is_empty() {
                let place = if run.anywhere {
                    "on the canvas".to_string()
                } else {
                    "on screen. Say \"anywhere\" to search the whole canvas".to_string()
                };
                return Err(format!("I couldn't find {} {place}.", describe(selector)));
            }
            return Ok(ids);
        }

        let existing = |ids: &[Uuid]| -> Vec<Uuid> {
            ids.iter()
                .copied()
                .filter(|id| objects.iter().any(|o| o.id == *id))
                .collect()
        };
        let created = existing(&run.created);
        if !created.is_empty() {
            return Ok(created);
        }
        let selected = existing(&ctx.last_selection);
        if !selected.is_empty() {
            return Ok(selected);
        }
        let layout = matches!(
            action,
            Action::ArrangeHorizontal(_) | Action::ArrangeVertical(_) | Action::ArrangeGrid(_) | Action::DistributeEvenly(_)
        );
        if layout {
            let all = resolver.all_ids(!run.anywhere);
            if !all.is_empty() {
                return Ok(all);
            }
        }
        Err(format!(
            "Which objects should I {}? Describe them, for example \"the red circles\".",
            verb(action)
        ))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn created(ctx: &mut CanvasContext, run: &mut Run, result: &ToolResult, summary: String) -> Step {
    match (result.success, result.object_id) {
        (true, Some(id)) => {
            run.created.push(id);
            ctx.last_selection.clone_from(&run.created);
            Step::Done(summary)
        }
        _ => Step::Failed(result.error.clone().unwrap_or_else(|| "could not create the object".into())),
    }
}

/// `Done` when every result succeeded, otherwise the distinct errors.
fn tally(results: &[ToolResult], summary: String) -> Step {
    let mut errors: Vec<String> = Vec::new();
    for error in results.iter().filter(|r| !r.success).filter_map(|r| r.error.clone()) {
        if !errors.contains(&error) {
            errors.push(error);
        }
    }
    if errors.is_empty() {
        return Step::Done(summary);
    }
    let succeeded = results.iter().filter(|r| r.success).count();
    let mut message = errors.join("; ");
    if succeeded > 0 {
        message.push_str(&format!(" ({succeeded} of {} succeeded)", results.len()));
    }
    Step::Failed(message)
}

fn objects_phrase(count: usize) -> String {
    if count == 1 { "1 object".into() } else { format!("{count} objects") }
}

fn verb(action: &Action) -> &'static str {
    match action {
        Action::MoveObject(_) => "move",
        Action::ResizeObject(_) => "resize",
        Action::RotateObject(_) => "rotate",
        Action::DeleteObject(_) => "delete",
        Action::DistributeEvenly(_) => "distribute",
        _ => "arrange",
    }
}

fn describe(selector: &Selector) -> String {
    match selector {
        Selector::Text(text) if text.trim().parse::<Uuid>().is_ok() => "that object".into(),
        Selector::Text(text) => format!("\"{}\"", text.trim()),
        Selector::Structured(s) => match s.description.as_deref() {
            Some(d) => format!("\"{d}\""),
            None => {
                let words: Vec<&str> = [s.color.as_deref(), s.kind.as_deref()].into_iter().flatten().collect();
                if words.is_empty() { "those objects".into() } else { format!("any {}", words.join(" ")) }
            }
        },
        Selector::Many(_) => "those objects".into(),
    }
}

/// Width and height for a new rectangle or ellipse. An aspect ratio keeps
/// the default height unless a side is given.
fn shape_size(shape: &CreateShape) -> (f64, f64) {
    let aspect = shape.aspect_ratio.filter(|a| a.is_finite() && *a > 0.0);
    match (shape.width, shape.height, aspect) {
        (Some(width), Some(height), _) => (width, height),
        (Some(width), None, Some(aspect)) => (width, width / aspect),
        (None, Some(height), Some(aspect)) => (height * aspect, height),
        (None, None, Some(aspect)) => (aspect * DEFAULT_RECT_HEIGHT, DEFAULT_RECT_HEIGHT),
        (width, height, None) => (width.unwrap_or(DEFAULT_RECT_WIDTH), height.unwrap_or(DEFAULT_RECT_HEIGHT)),
    }
}

/// Turn resize parameters into a concrete change for one object. Circles
/// resize by radius and text by font size so both keep their proportions.
fn plan_resize(obj: &CanvasObject, params: &ResizeParams) -> Option<Resize> {
    match obj.kind {
        ObjectKind::Circle => {
            let from_sides = match (params.width, params.height) {
                (Some(w), Some(h)) => Some(w.max(h) / 2.0),
                (Some(side), None) | (None, Some(side)) => Some(side / 2.0),
                (None, None) => None,
            };
            params
                .radius
                .or(from_sides)
                .or_else(|| params.scale.map(|s| obj.width / 2.0 * s))
                .map(Resize::Radius)
        }
        ObjectKind::Text => {
            let current = obj.font_size.unwrap_or(DEFAULT_FONT_SIZE);
            params
                .font_size
                .or_else(|| params.scale.map(|s| current * s))
                .or_else(|| params.height.map(|h| h / TEXT_LINE_HEIGHT))
                .or_else(|| params.width.filter(|_| obj.width > 0.0).map(|w| current * w / obj.width))
                .map(Resize::Font)
        }
        ObjectKind::Rectangle | ObjectKind::Ellipse => {
            if let Some(radius) = params.radius.filter(|_| params.width.is_none() && params.height.is_none()) {
                return Some(Resize::Box(radius * 2.0, radius * 2.0));
            }
            if params.width.is_none() && params.height.is_none() && params.scale.is_none() {
                return None;
            }
            let scale = params.scale.unwrap_or(1.0);
            Some(Resize::Box(
                params.width.unwrap_or(obj.width * scale),
                params.height.unwrap_or(obj.height * scale),
            ))
        }
    }
}

impl Resize {
    /// Resulting bounding box size, for the guardrail.
    fn dimensions(self, obj: &CanvasObject) -> (f64, f64) {
        match self {
            Self::Box(width, height) => (width, height),
            Self::Radius(radius) => (radius * 2.0, radius * 2.0),
            Self::Font(size) => {
                let ratio = obj.font_size.filter(|s| *s > 0.0).map_or(1.0, |current| size / current);
                (obj.width * ratio, obj.height * ratio)
            }
        }
    }
}

// =============================================================================
// CONSUMER
// =============================================================================

/// Run the queue consumer for one canvas until `shutdown` flips to `true`.
///
/// The consumer drains the queue, then sleeps until the store reports a
/// change for its canvas.
pub fn spawn_canvas_consumer(
    orchestrator: Arc<Orchestrator>,
    canvas_id: Uuid,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut changes = orchestrator.queue.subscribe();
        let mut ctx = orchestrator.context(canvas_id);
        info!(%canvas_id, "orchestrator: consumer started");

        loop {
            drain(&orchestrator, &mut ctx).await;
            if !wait_for_change(&mut changes, &mut shutdown, canvas_id).await {
                break;
            }
        }
        info!(%canvas_id, "orchestrator: consumer stopped");
    })
}

async fn drain(orchestrator: &Orchestrator, ctx: &mut CanvasContext) {
    loop {
        match orchestrator.process_next(ctx).await {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(e) => {
                warn!(canvas_id = %ctx.canvas_id, error = %e, code = e.error_code(), "orchestrator: queue read failed");
                return;
            }
        }
    }
}

/// Wait for a change on `canvas_id`. Returns `false` on shutdown.
async fn wait_for_change(
    changes: &mut broadcast::Receiver<Uuid>,
    shutdown: &mut watch::Receiver<bool>,
    canvas_id: Uuid,
) -> bool {
    loop {
        if *shutdown.borrow() {
            return false;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
            received = changes.recv() => match received {
                Ok(id) if id == canvas_id => return true,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%canvas_id, skipped, "orchestrator: change notifications lagged");
                    return true;
                }
                Err(broadcast::error::RecvError::Closed) => return false,
            },
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
