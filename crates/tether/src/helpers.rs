//! Callback helpers
//!
//! Ready-made change and mount callbacks for common cases.

use std::rc::Rc;

use crate::{BindResult, Callback, Change, Outcome};

/// Hand the value back for the default rule
pub fn identity() -> Callback {
    Rc::new(|change: &mut Change<'_>| Ok(Outcome::Replace(change.value.clone())))
}

/// Run `callbacks` in order; the last outcome wins
pub fn chain(callbacks: Vec<Callback>) -> Callback {
    Rc::new(move |change: &mut Change<'_>| {
        let mut outcome = Outcome::Done;
        for callback in &callbacks {
            outcome = callback(&mut *change)?;
        }
        Ok(outcome)
    })
}

/// Class names toggled by [`animate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Animation {
    /// Added when a node first receives a value, removed on removal
    pub add: Option<String>,
    /// Re-applied whenever a value changes
    pub change: Option<String>,
    /// Added on removal
    pub remove: Option<String>,
    /// Keep removed nodes attached; the caller detaches them later
    pub retain: bool,
}

impl Animation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, class: &str) -> Self {
        self.add = Some(class.to_string());
        self
    }

    pub fn change(mut self, class: &str) -> Self {
        self.change = Some(class.to_string());
        self
    }

    pub fn remove(mut self, class: &str) -> Self {
        self.remove = Some(class.to_string());
        self
    }

    pub fn retain(mut self) -> Self {
        self.retain = true;
        self
    }
}

/// Toggle CSS classes as values arrive, change and leave
pub fn animate(animation: Animation) -> Callback {
    Rc::new(move |change: &mut Change<'_>| toggle(&animation, change))
}

fn toggle(animation: &Animation, change: &mut Change<'_>) -> BindResult<Outcome> {
    let node = change.node;

    if change.value.is_null() {
        if let Some(class) = &animation.add {
            change.surface.remove_class(node, class)?;
        }
        if let Some(class) = &animation.remove {
            change.surface.add_class(node, class)?;
        }
        return Ok(if animation.retain { Outcome::Retain } else { Outcome::Done });
    }

    if !change.previous.is_null() {
        if let Some(class) = &animation.change {
            // Restart: drop the class first so it is applied afresh
            if change.surface.has_class(node, class) {
                change.surface.remove_class(node, class)?;
            }
            change.surface.add_class(node, class)?;
        }
    } else if let Some(class) = &animation.add {
        change.surface.add_class(node, class)?;
    }
    Ok(Outcome::Done)
}
