//! The three-step node wizard: pick a farm, pick a zone, configure the node.
//!
//! Create mode walks all three steps. Edit mode opens directly on the
//! configuration step with the farm/zone fixed and never goes back. Every
//! operation takes `&mut self`, so one request at a time is in flight.
//! Errors are returned to the caller and mirrored in the banner; the draft
//! is never discarded on failure.

use std::fmt;

use tracing::{debug, info, warn};

use crate::api::{ManagementApi, NodeApi};
use crate::assembler::{normalize_id, AssemblyError, NodeDraft};
use crate::config::DraftDefaults;
use crate::document::{Block, BlockErrors};
use crate::error::{ConsoleError, ConsoleResult};
use crate::hierarchy::Hierarchy;
use crate::model::{Farm, NodeConfiguration, Zone};
use crate::submit;

// ---------------------------------------------------------------------------
// Steps and modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SelectFarm,
    SelectZone,
    ConfigureNode,
}

impl Step {
    pub fn number(self) -> u8 {
        match self {
            Step::SelectFarm => 1,
            Step::SelectZone => 2,
            Step::ConfigureNode => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::SelectFarm => "Select farm",
            Step::SelectZone => "Select zone",
            Step::ConfigureNode => "Configure node",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: {}", self.number(), self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardMode {
    Create,
    /// Editing the node stored under `node_id`.
    Edit { node_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Info(String),
    Error(String),
}

/// How a wizard ended, for the node list to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardOutcome {
    Saved(NodeConfiguration),
    Cancelled,
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Wizard {
    mode: WizardMode,
    step: Step,
    hierarchy: Hierarchy,
    draft: NodeDraft,
    banner: Option<Banner>,
    block_errors: BlockErrors,
    loading: bool,
    saved: Option<NodeConfiguration>,
}

impl Wizard {
    pub fn create(defaults: &DraftDefaults) -> Self {
        Self {
            mode: WizardMode::Create,
            step: Step::SelectFarm,
            hierarchy: Hierarchy::new(),
            draft: NodeDraft::from_defaults(defaults),
            banner: None,
            block_errors: BlockErrors::default(),
            loading: false,
            saved: None,
        }
    }

    /// Open an existing node for editing. The document itself is not kept;
    /// its fields seed the draft.
    pub fn edit(doc: &NodeConfiguration, defaults: &DraftDefaults) -> Self {
        let identity = &doc.identity;
        Self {
            mode: WizardMode::Edit {
                node_id: identity.node_id.clone(),
            },
            step: Step::ConfigureNode,
            hierarchy: Hierarchy::locked(&identity.farm_id, &identity.zone_id),
            draft: NodeDraft::from_existing(doc, defaults),
            banner: None,
            block_errors: BlockErrors::default(),
            loading: false,
            saved: None,
        }
    }

    pub fn mode(&self) -> &WizardMode {
        &self.mode
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn draft(&self) -> &NodeDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut NodeDraft {
        &mut self.draft
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn block_errors(&self) -> &BlockErrors {
        &self.block_errors
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_closed(&self) -> bool {
        self.saved.is_some()
    }

    /// Replace one block's text and drop its stale error.
    pub fn set_block(&mut self, block: Block, text: impl Into<String>) {
        self.draft.blocks.set(block, text);
        self.block_errors.remove(block);
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Load farms and zones for the first screen.
    pub async fn open<A: ManagementApi>(&mut self, api: &A) -> ConsoleResult<()> {
        self.ensure_open()?;
        self.loading = true;
        let result = self.hierarchy.load(api).await;
        self.settle(result)
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub fn can_next(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.step {
            Step::SelectFarm => self.hierarchy.selected_farm().is_some(),
            Step::SelectZone => self.hierarchy.selected_zone().is_some(),
            Step::ConfigureNode => false,
        }
    }

    pub fn next(&mut self) -> ConsoleResult<Step> {
        self.ensure_open()?;
        let step = self.step;
        let next = match step {
            Step::SelectFarm if self.hierarchy.selected_farm().is_some() => Step::SelectZone,
            Step::SelectFarm => return self.fail(ConsoleError::validation("select a farm first")),
            Step::SelectZone if self.hierarchy.selected_zone().is_some() => Step::ConfigureNode,
            Step::SelectZone => return self.fail(ConsoleError::validation("select a zone first")),
            Step::ConfigureNode => {
                return self.fail(ConsoleError::validation(
                    "the last step is completed by saving the node",
                ))
            }
        };
        debug!(from = step.number(), to = next.number(), "wizard advanced");
        self.step = next;
        self.banner = None;
        Ok(next)
    }

    pub fn can_previous(&self) -> bool {
        !self.is_closed() && self.mode == WizardMode::Create && self.step != Step::SelectFarm
    }

    pub fn previous(&mut self) -> ConsoleResult<Step> {
        self.ensure_open()?;
        if self.mode != WizardMode::Create {
            return Err(ConsoleError::validation(
                "an existing node is edited on the configuration step only",
            ));
        }
        self.step = match self.step {
            Step::SelectFarm => {
                return Err(ConsoleError::validation("already on the first step"));
            }
            Step::SelectZone => Step::SelectFarm,
            Step::ConfigureNode => Step::SelectZone,
        };
        Ok(self.step)
    }

    // -----------------------------------------------------------------------
    // Farms and zones
    // -----------------------------------------------------------------------

    pub async fn select_farm<A: ManagementApi>(
        &mut self,
        api: &A,
        farm_id: &str,
    ) -> ConsoleResult<()> {
        self.ensure_open()?;
        self.loading = true;
        let result = self.hierarchy.select_farm(api, farm_id).await;
        self.settle(result)
    }

    pub fn select_zone(&mut self, zone_id: &str) -> ConsoleResult<()> {
        self.ensure_open()?;
        let result = self.hierarchy.select_zone(zone_id);
        self.settle(result)
    }

    pub async fn create_farm<A: ManagementApi>(
        &mut self,
        api: &A,
        raw_id: &str,
    ) -> ConsoleResult<Farm> {
        self.ensure_open()?;
        self.loading = true;
        let result = self.hierarchy.create_farm(api, raw_id).await;
        let farm = self.settle(result)?;
        self.banner = Some(Banner::Info(format!("farm {} created", farm.farm_id)));
        Ok(farm)
    }

    pub async fn create_zone<A: ManagementApi>(
        &mut self,
        api: &A,
        raw_id: &str,
    ) -> ConsoleResult<Zone> {
        self.ensure_open()?;
        self.loading = true;
        let result = self.hierarchy.create_zone(api, raw_id).await;
        let zone = self.settle(result)?;
        self.banner = Some(Banner::Info(format!("zone {} created", zone.zone_id)));
        Ok(zone)
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Assemble the draft and send it. On success the wizard is closed and
    /// the server's copy is returned; on failure everything stays editable.
    pub async fn submit<A: NodeApi>(&mut self, api: &A) -> ConsoleResult<NodeConfiguration> {
        self.ensure_open()?;
        if self.step != Step::ConfigureNode {
            return self.fail(ConsoleError::validation(
                "select a farm and a zone before saving the node",
            ));
        }

        self.loading = true;
        self.banner = None;
        self.block_errors = BlockErrors::default();

        let result = self.send(api).await;
        let saved = self.settle(result)?;

        info!(node_id = %saved.identity.node_id, "node saved");
        self.banner = Some(Banner::Info(format!(
            "node {} saved",
            saved.identity.node_id
        )));
        self.saved = Some(saved.clone());
        Ok(saved)
    }

    async fn send<A: NodeApi>(&mut self, api: &A) -> ConsoleResult<NodeConfiguration> {
        if let Some(farm_id) = self.hierarchy.selected_farm() {
            self.draft.fields.farm_id = farm_id.to_string();
        }
        if let Some(zone_id) = self.hierarchy.selected_zone() {
            self.draft.fields.zone_id = zone_id.to_string();
        }

        if let WizardMode::Edit { node_id } = &self.mode {
            let requested = normalize_id(&self.draft.fields.node_id);
            if requested != normalize_id(node_id) {
                return Err(ConsoleError::validation(format!(
                    "the id of node {node_id} cannot be changed (got {requested})"
                )));
            }
        }

        let mut doc = match self.draft.assemble() {
            Ok(doc) => doc,
            Err(AssemblyError::Blocks(errors)) => {
                let msg = errors.to_string();
                self.block_errors = errors;
                return Err(ConsoleError::Validation(msg));
            }
            Err(other) => return Err(ConsoleError::Validation(other.to_string())),
        };

        // The stored key wins over its normalized form, whatever its case.
        if let WizardMode::Edit { node_id } = &self.mode {
            doc.identity.node_id.clone_from(node_id);
        }

        submit::submit(api, &self.mode, &doc).await
    }

    /// Close the wizard. A saved wizard yields its document; anything else
    /// is discarded without confirmation.
    pub fn finish(self) -> WizardOutcome {
        match self.saved {
            Some(doc) => WizardOutcome::Saved(doc),
            None => WizardOutcome::Cancelled,
        }
    }

    /// Discard the wizard and its draft.
    pub fn cancel(self) -> WizardOutcome {
        debug!(mode = ?self.mode, step = self.step.number(), "wizard cancelled");
        WizardOutcome::Cancelled
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn ensure_open(&self) -> ConsoleResult<()> {
        if self.is_closed() {
            return Err(ConsoleError::validation("wizard is closed"));
        }
        Ok(())
    }

    /// End of every request: clear the loading flag and surface failures.
    fn settle<T>(&mut self, result: ConsoleResult<T>) -> ConsoleResult<T> {
        self.loading = false;
        match result {
            Ok(value) => Ok(value),
            Err(err) => self.fail(err),
        }
    }

    fn fail<T>(&mut self, err: ConsoleError) -> ConsoleResult<T> {
        if let ConsoleError::Transport(detail) = &err {
            warn!(detail = %detail, "backend unreachable");
        }
        self.banner = Some(Banner::Error(err.to_string()));
        Err(err)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
