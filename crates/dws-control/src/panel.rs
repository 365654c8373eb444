//! Control panel surface and its synchronisation with the state machine.
//!
//! [`PanelSync`] renders one control listing the role's states, turns presses
//! into state requests and pushes every applied state back to the surface.
//! Surface failures are logged and never interrupt a state change.

use std::sync::Arc;

use dws_core::StateName;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};
use crate::events::{EventBus, Subscription, PANEL_PRESS};
use crate::request::{Origin, StateRequester};

/// How the panel button appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelDefinition {
    /// Button label.
    #[serde(default = "PanelDefinition::default_name")]
    pub name: String,

    /// Icon name.
    #[serde(default = "PanelDefinition::default_icon")]
    pub icon: String,

    /// Text shown above the state selector.
    #[serde(default = "PanelDefinition::default_title")]
    pub title: String,

    /// Where the button is placed.
    #[serde(default = "PanelDefinition::default_location")]
    pub location: String,
}

impl PanelDefinition {
    fn default_name() -> String {
        "Combine Room".to_string()
    }

    fn default_icon() -> String {
        "Sliders".to_string()
    }

    fn default_title() -> String {
        "Tap the toggle to combine or divide".to_string()
    }

    fn default_location() -> String {
        "HomeScreen".to_string()
    }
}

impl Default for PanelDefinition {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            icon: Self::default_icon(),
            title: Self::default_title(),
            location: Self::default_location(),
        }
    }
}

/// The prompt shown while the panel is locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPrompt {
    /// Prompt title.
    #[serde(default = "LockPrompt::default_title")]
    pub title: String,

    /// Prompt body.
    #[serde(default = "LockPrompt::default_text")]
    pub text: String,

    /// Optional hint shown as the only option.
    #[serde(default = "LockPrompt::default_option")]
    pub option: Option<String>,
}

impl LockPrompt {
    fn default_title() -> String {
        "Combined Mode".to_string()
    }

    fn default_text() -> String {
        "This device is in combined mode".to_string()
    }

    #[allow(clippy::unnecessary_wraps)]
    fn default_option() -> Option<String> {
        Some("Please use main Touch Panel".to_string())
    }
}

impl Default for LockPrompt {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            text: Self::default_text(),
            option: Self::default_option(),
        }
    }
}

/// A rendered state selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelControl {
    /// Appearance.
    pub definition: PanelDefinition,
    /// Selectable states, in definition order.
    pub options: Vec<StateName>,
}

/// The UI surface a panel is drawn on.
pub trait PanelSurface: Send + Sync {
    /// Draw (or redraw) the control.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Panel` if the surface rejects the control.
    fn render(&self, control: &PanelControl) -> Result<()>;

    /// Mark `selected` as the active option.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Panel` if the surface cannot be updated.
    fn update(&self, selected: &StateName) -> Result<()>;

    /// Remove the control.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Panel` if the surface cannot be updated.
    fn remove(&self) -> Result<()>;

    /// Hide the surface behind `prompt`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Panel` if the surface cannot be locked.
    fn lock(&self, prompt: &LockPrompt) -> Result<()>;

    /// Undo [`lock`](Self::lock). No-op if not locked.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Panel` if the surface cannot be unlocked.
    fn unlock(&self) -> Result<()>;
}

/// What the panel currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PanelView {
    /// The rendered control, if any.
    pub control: Option<PanelControl>,
    /// The highlighted option.
    pub selected: Option<StateName>,
    /// The lock prompt, while locked.
    pub locked: Option<LockPrompt>,
    /// Incremented on every change.
    pub revision: u64,
}

/// An in-memory panel surface.
///
/// Presses are published on the event bus under [`PANEL_PRESS`].
#[derive(Debug)]
pub struct PanelModel {
    events: EventBus,
    view: RwLock<PanelView>,
}

impl PanelModel {
    /// Create an empty panel publishing presses on `events`.
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            view: RwLock::new(PanelView::default()),
        }
    }

    /// Snapshot of what the panel shows.
    #[must_use]
    pub fn view(&self) -> PanelView {
        self.view.read().clone()
    }

    /// Press the option named `value`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::PanelLocked` while locked and
    /// `ControlError::Panel` if nothing is rendered or `value` is not an
    /// option.
    pub fn press(&self, value: &str) -> Result<()> {
        let state = {
            let view = self.view.read();
            let control = view
                .control
                .as_ref()
                .ok_or_else(|| ControlError::Panel("no panel rendered".into()))?;
            if view.locked.is_some() {
                return Err(ControlError::PanelLocked);
            }
            control
                .options
                .iter()
                .find(|option| option.as_str() == value)
                .cloned()
                .ok_or_else(|| ControlError::Panel(format!("[{value}] is not a panel option")))?
        };

        tracing::info!(%state, "Panel pressed");
        self.events.publish(PANEL_PRESS, vec![state.to_string()]);
        Ok(())
    }

    fn change(&self, apply: impl FnOnce(&mut PanelView)) {
        let mut view = self.view.write();
        apply(&mut view);
        view.revision += 1;
    }
}

impl PanelSurface for PanelModel {
    fn render(&self, control: &PanelControl) -> Result<()> {
        self.change(|view| view.control = Some(control.clone()));
        Ok(())
    }

    fn update(&self, selected: &StateName) -> Result<()> {
        self.change(|view| view.selected = Some(selected.clone()));
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        self.change(|view| {
            view.control = None;
            view.selected = None;
        });
        Ok(())
    }

    fn lock(&self, prompt: &LockPrompt) -> Result<()> {
        tracing::info!(title = %prompt.title, "Locking panel");
        self.change(|view| view.locked = Some(prompt.clone()));
        Ok(())
    }

    fn unlock(&self) -> Result<()> {
        if self.view.read().locked.is_none() {
            return Ok(());
        }
        tracing::info!("Unlocking panel");
        self.change(|view| view.locked = None);
        Ok(())
    }
}

/// Keeps a [`PanelSurface`] in step with the state machine.
pub struct PanelSync {
    surface: Arc<dyn PanelSurface>,
    definition: PanelDefinition,
    press: Mutex<Option<Subscription>>,
}

impl std::fmt::Debug for PanelSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelSync")
            .field("definition", &self.definition)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl PanelSync {
    /// Create a sync for `surface`.
    #[must_use]
    pub fn new(surface: Arc<dyn PanelSurface>, definition: PanelDefinition) -> Self {
        Self {
            surface,
            definition,
            press: Mutex::new(None),
        }
    }

    /// Render the control for `options` and turn presses into requests.
    pub fn activate(&self, options: Vec<StateName>, events: &EventBus, requester: StateRequester) {
        let control = PanelControl {
            definition: self.definition.clone(),
            options,
        };
        if let Err(e) = self.surface.render(&control) {
            tracing::warn!(error = %e, "Failed to render panel");
        }

        let subscription = events.subscribe(PANEL_PRESS, move |event| {
            match event.args.first().map(|value| StateName::new(value.as_str())) {
                Some(Ok(state)) => requester.request(state, Origin::Panel),
                _ => tracing::debug!(args = ?event.args, "Ignoring malformed panel press"),
            }
        });
        *self.press.lock() = Some(subscription);
    }

    /// Push the applied state to the surface.
    pub fn state_changed(&self, state: &StateName) {
        if let Err(e) = self.surface.update(state) {
            tracing::warn!(%state, error = %e, "Failed to update panel");
        }
    }

    /// Release the press subscription and remove the control.
    pub fn deactivate(&self) {
        let released = self.press.lock().take();
        if released.is_none() {
            return;
        }
        drop(released);
        if let Err(e) = self.surface.remove() {
            tracing::warn!(error = %e, "Failed to remove panel");
        }
    }

    /// Returns true between [`activate`](Self::activate) and
    /// [`deactivate`](Self::deactivate).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.press.lock().is_some()
    }
}
