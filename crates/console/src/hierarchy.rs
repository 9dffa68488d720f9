//! Farm and zone lists behind the first two wizard steps.
//!
//! In create mode the resolver follows the selection: picking a farm
//! reloads its zones and defaults to the first one. In edit mode the
//! farm/zone pair is fixed and only the zone list is loaded for display.

use tracing::{info, warn};

use crate::api::ManagementApi;
use crate::assembler::normalize_id;
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::{Farm, Zone};

#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    locked: bool,
    farms: Vec<Farm>,
    zones: Vec<Zone>,
    selected_farm: Option<String>,
    selected_zone: Option<String>,
}

impl Hierarchy {
    /// Free selection, nothing chosen yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed to the farm/zone of an existing node.
    pub fn locked(farm_id: &str, zone_id: &str) -> Self {
        Self {
            locked: true,
            selected_farm: Some(farm_id.to_string()),
            selected_zone: Some(zone_id.to_string()),
            ..Self::default()
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn farms(&self) -> &[Farm] {
        &self.farms
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn selected_farm(&self) -> Option<&str> {
        self.selected_farm.as_deref()
    }

    pub fn selected_zone(&self) -> Option<&str> {
        self.selected_zone.as_deref()
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Initial load: the farm list, then the zones of the selected farm.
    pub async fn load<A: ManagementApi>(&mut self, api: &A) -> ConsoleResult<()> {
        self.farms = api.list_farms().await?;
        info!(farms = self.farms.len(), "farms loaded");

        if self.locked {
            if let Some(farm_id) = self.selected_farm.clone() {
                self.zones = api.list_zones(&farm_id).await?;
            }
            return Ok(());
        }

        if self.selected_farm.is_none() {
            if let Some(first) = self.farms.first() {
                self.selected_farm = Some(first.farm_id.clone());
            }
        }
        if self.selected_farm.is_some() {
            self.refresh_zones(api).await?;
        }
        Ok(())
    }

    /// Reload zones for the selected farm and default the zone selection
    /// to the first entry.
    async fn refresh_zones<A: ManagementApi>(&mut self, api: &A) -> ConsoleResult<()> {
        let Some(farm_id) = self.selected_farm.clone() else {
            self.zones.clear();
            self.selected_zone = None;
            return Ok(());
        };

        // Clear first so a failed reload never leaves another farm's zones.
        self.zones.clear();
        self.selected_zone = None;

        self.zones = api.list_zones(&farm_id).await?;
        self.selected_zone = self.zones.first().map(|z| z.zone_id.clone());
        info!(farm_id = %farm_id, zones = self.zones.len(), "zones loaded");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    pub async fn select_farm<A: ManagementApi>(
        &mut self,
        api: &A,
        farm_id: &str,
    ) -> ConsoleResult<()> {
        self.ensure_unlocked("farm")?;
        if !self.farms.iter().any(|f| f.farm_id == farm_id) {
            return Err(ConsoleError::validation(format!("unknown farm {farm_id}")));
        }
        if self.selected_farm.as_deref() == Some(farm_id) {
            return Ok(());
        }
        self.selected_farm = Some(farm_id.to_string());
        self.refresh_zones(api).await
    }

    pub fn select_zone(&mut self, zone_id: &str) -> ConsoleResult<()> {
        self.ensure_unlocked("zone")?;
        if !self.zones.iter().any(|z| z.zone_id == zone_id) {
            return Err(ConsoleError::validation(format!("unknown zone {zone_id}")));
        }
        self.selected_zone = Some(zone_id.to_string());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inline creation
    // -----------------------------------------------------------------------

    /// Create a farm, then select it. The id is upper-cased and doubles as
    /// the farm's name.
    pub async fn create_farm<A: ManagementApi>(
        &mut self,
        api: &A,
        raw_id: &str,
    ) -> ConsoleResult<Farm> {
        self.ensure_unlocked("farm")?;
        if raw_id.trim().is_empty() {
            return Err(ConsoleError::validation("enter an id for the new farm"));
        }

        let farm_id = normalize_id(raw_id);
        let request = Farm {
            farm_id: farm_id.clone(),
            name: farm_id.clone(),
        };
        let farm = api.create_farm(&request).await?;
        info!(farm_id = %farm.farm_id, "farm created");

        self.farms.push(farm.clone());
        self.selected_farm = Some(farm.farm_id.clone());
        if let Err(e) = self.refresh_zones(api).await {
            warn!(farm_id = %farm.farm_id, error = %e, "zone reload after farm creation failed");
        }
        Ok(farm)
    }

    /// Create a zone in the selected farm, then select it. Duplicates are
    /// checked against the loaded list only; the backend has the final say.
    pub async fn create_zone<A: ManagementApi>(
        &mut self,
        api: &A,
        raw_id: &str,
    ) -> ConsoleResult<Zone> {
        self.ensure_unlocked("zone")?;
        let Some(farm_id) = self.selected_farm.clone() else {
            return Err(ConsoleError::validation("select a farm before adding a zone"));
        };
        if raw_id.trim().is_empty() {
            return Err(ConsoleError::validation("enter an id for the new zone"));
        }

        let zone_id = normalize_id(raw_id);
        if self.zones.iter().any(|z| z.zone_id == zone_id) {
            return Err(ConsoleError::validation(format!(
                "zone {zone_id} already exists in farm {farm_id}"
            )));
        }

        let request = Zone {
            zone_id: zone_id.clone(),
            name: zone_id.clone(),
            farm_id: Some(farm_id.clone()),
        };
        let zone = api.create_zone(&farm_id, &request).await?;
        info!(farm_id = %farm_id, zone_id = %zone.zone_id, "zone created");

        self.zones.push(zone.clone());
        self.selected_zone = Some(zone.zone_id.clone());
        Ok(zone)
    }

    fn ensure_unlocked(&self, what: &str) -> ConsoleResult<()> {
        if self.locked {
            return Err(ConsoleError::validation(format!(
                "the {what} of an existing node cannot be changed"
            )));
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
