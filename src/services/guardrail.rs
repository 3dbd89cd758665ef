//! Guardrail policy — stop risky mutations and ask first.
//!
//! DESIGN
//! ======
//! Checks run after selectors are resolved and before anything executes.
//! A trip is terminal for the command: the caller posts the returned
//! question, performs no mutation and marks the command complete. There is
//! no pending-confirmation state; the user reissues the command with the
//! word "confirm" to get past the gate.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::state::CanvasObject;

static CONFIRM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bconfirm(ed)?\b").expect("valid regex"));

/// True if the command text explicitly confirms a risky operation.
#[must_use]
pub fn is_confirmed(text: &str) -> bool {
    CONFIRM_RE.is_match(text)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guardrail {
    delete_limit: usize,
    resize_factor: f64,
    world_width: f64,
    world_height: f64,
}

impl Guardrail {
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            delete_limit: config.guard_delete_limit,
            resize_factor: config.guard_resize_factor,
            world_width: config.world_width,
            world_height: config.world_height,
        }
    }

    /// Deleting more than the limit needs confirmation.
    #[must_use]
    pub fn check_delete(&self, target_count: usize) -> Option<String> {
        (target_count > self.delete_limit).then(|| {
            format!(
                "That would delete {target_count} objects. Are you sure? (yes/no) \
                 Reply with \"confirm\" plus your request to go ahead."
            )
        })
    }

    /// Growing any target's width or height past the factor needs
    /// confirmation. Missing dimensions are not checked.
    #[must_use]
    pub fn check_resize(&self, targets: &[&CanvasObject], width: Option<f64>, height: Option<f64>) -> Option<String> {
        let too_big = targets.iter().any(|obj| {
            width.is_some_and(|w| w > obj.width * self.resize_factor)
                || height.is_some_and(|h| h > obj.height * self.resize_factor)
        });
        too_big.then(|| {
            format!(
                "That would make {} object(s) more than {}x larger. Are you sure? (yes/no) \
                 Reply with \"confirm\" plus your request to go ahead.",
                targets.len(),
                self.resize_factor
            )
        })
    }

    /// Moving every object on the canvas so the group's top-left lands at
    /// `dest` needs confirmation when the group would leave the world.
    #[must_use]
    pub fn check_move(&self, targets: &[Uuid], objects: &[CanvasObject], dest: (f64, f64)) -> Option<String> {
        if objects.is_empty() {
            return None;
        }
        let target_set: HashSet<&Uuid> = targets.iter().collect();
        if !objects.iter().all(|o| target_set.contains(&o.id)) {
            return None;
        }

        let left = objects.iter().map(|o| o.x).fold(f64::INFINITY, f64::min);
        let top = objects.iter().map(|o| o.y).fold(f64::INFINITY, f64::min);
        let right = objects
            .iter()
            .map(|o| o.x + o.width)
            .fold(f64::NEG_INFINITY, f64::max);
        let bottom = objects
            .iter()
            .map(|o| o.y + o.height)
            .fold(f64::NEG_INFINITY, f64::max);
        let (dx, dy) = (dest.0 - left, dest.1 - top);

        let outside = left + dx < 0.0
            || top + dy < 0.0
            || right + dx > self.world_width
            || bottom + dy > self.world_height;
        outside.then(|| {
            format!(
                "That would move all {} objects off the canvas. Are you sure? (yes/no) \
                 Reply with \"confirm\" plus your request to go ahead.",
                objects.len()
            )
        })
    }
}

#[cfg(test)]
#[path = "guardrail_test.rs"]
mod tests;
