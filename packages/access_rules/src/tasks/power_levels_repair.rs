use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use room_access_entity::event_types;
use room_access_entity::{ACCESS_RULES_TYPE, ADMIN_POWER_LEVEL, AccessRule, MembershipState, StateEvent};

use crate::config::AccessRulesConfig;
use crate::error::ServiceError;
use crate::services::{RoomMaintenanceStore, TaskCheckpoint, TaskStatus, TaskStore};

/// Scheduler action name of the repair task
pub const FIX_POWER_LEVELS_ACTION: &str = "fix_existing_rooms_power_levels";

/// Rooms processed between two checkpoints
pub const ROOM_BATCH_SIZE: usize = 50;

/// Outcome of [`PowerLevelsRepairTask::schedule_if_needed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairSchedule {
    /// Both fixes are off, or this is a worker process
    Disabled,
    /// Queued by this call
    Scheduled,
    /// Queued by an earlier start and not finished yet
    Pending,
    Complete,
}

impl RepairSchedule {
    /// Whether this process should run the task now
    pub fn needs_run(self) -> bool {
        matches!(self, RepairSchedule::Scheduled | RepairSchedule::Pending)
    }
}

/// Brings the power levels of existing rooms in line with the configured fixes
///
/// Rooms are visited in room ID order and progress is checkpointed after
/// every batch, so an interrupted run picks up after the last finished batch.
pub struct PowerLevelsRepairTask {
    config: Arc<AccessRulesConfig>,
    rooms: Arc<dyn RoomMaintenanceStore>,
    tasks: Arc<dyn TaskStore>,
}

impl PowerLevelsRepairTask {
    pub fn new(
        config: Arc<AccessRulesConfig>,
        rooms: Arc<dyn RoomMaintenanceStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> Self {
        Self { config, rooms, tasks }
    }

    /// Queue the task on the main process when a fix is enabled and no task exists yet
    pub async fn schedule_if_needed(&self, is_main_process: bool) -> Result<RepairSchedule, ServiceError> {
        if !self.config.repair_task_enabled() || !is_main_process {
            return Ok(RepairSchedule::Disabled);
        }

        match self.tasks.task_status(FIX_POWER_LEVELS_ACTION).await? {
            Some(TaskStatus::Complete) => {
                debug!("Power levels repair already done");
                Ok(RepairSchedule::Complete)
            },
            Some(TaskStatus::Pending) => {
                debug!("Power levels repair task already queued");
                Ok(RepairSchedule::Pending)
            },
            None => {
                self.tasks.schedule_task(FIX_POWER_LEVELS_ACTION).await?;
                info!("Scheduled power levels repair of existing rooms");
                Ok(RepairSchedule::Scheduled)
            },
        }
    }

    /// Process every room after the stored checkpoint, then mark the task complete
    pub async fn run(&self) -> Result<(), ServiceError> {
        let mut checkpoint = self
            .tasks
            .load_checkpoint(FIX_POWER_LEVELS_ACTION)
            .await?
            .unwrap_or_default();

        if let Some(last_room_id) = &checkpoint.last_room_id {
            info!("Resuming power levels repair after room {}", last_room_id);
        }

        loop {
            let room_ids = self
                .rooms
                .room_ids_after(checkpoint.last_room_id.clone(), ROOM_BATCH_SIZE)
                .await?;
            if room_ids.is_empty() {
                break;
            }

            for room_id in room_ids {
                self.fix_room_power_levels(&room_id).await?;
                checkpoint.last_room_id = Some(room_id);
            }

            self.tasks.save_checkpoint(FIX_POWER_LEVELS_ACTION, &checkpoint).await?;
        }

        self.tasks.complete_task(FIX_POWER_LEVELS_ACTION).await?;
        info!("Fixing power levels of existing rooms complete");
        Ok(())
    }

    /// Patch one room's power levels, sending the update as a local admin
    ///
    /// Returns whether an updated `m.room.power_levels` event was sent.
    pub async fn fix_room_power_levels(&self, room_id: &str) -> Result<bool, ServiceError> {
        let local_joined: HashSet<String> = self
            .rooms
            .local_users_related_to_room(room_id)
            .await?
            .into_iter()
            .filter(|(_, membership)| *membership == MembershipState::Join)
            .map(|(user_id, _)| user_id)
            .collect();

        let Some(power_levels) = self
            .rooms
            .current_state_event(room_id, event_types::POWER_LEVELS, "")
            .await?
        else {
            return Ok(false);
        };
        if !power_levels.has_content() {
            return Ok(false);
        }

        let mut content = power_levels.content;
        let Some(admin) = local_admin(&mut content, &local_joined) else {
            debug!("No local admin in room {}, leaving its power levels alone", room_id);
            return Ok(false);
        };

        let mut changed = false;
        if self.config.add_live_location_power_levels {
            changed |= add_live_location_levels(&mut content);
        }
        if self.config.fix_admins_for_dm_power_levels && self.is_direct_room(room_id).await? {
            let members = self.rooms.member_state_keys(room_id).await?;
            changed |= promote_members(&mut content, &members);
        }

        if !changed {
            return Ok(false);
        }

        info!("Fixing power levels of room {}", room_id);
        let event = StateEvent::new_state(room_id, admin, event_types::POWER_LEVELS, "", Value::Object(content));
        match self.rooms.send_state_event(event).await {
            Ok(()) => Ok(true),
            Err(e) => {
                info!("Not possible to change power levels of room {}: {}", room_id, e);
                Ok(false)
            },
        }
    }

    async fn is_direct_room(&self, room_id: &str) -> Result<bool, ServiceError> {
        let rules = self.rooms.current_state_event(room_id, ACCESS_RULES_TYPE, "").await?;
        Ok(rules.is_some_and(|event| event.content_str("rule") == Some(AccessRule::Direct.as_str())))
    }
}

/// Spawn the repair task on the runtime, scheduling it first if needed
///
/// A task left pending by an earlier process is resumed from its checkpoint.
pub fn start_power_levels_repair_task(task: Arc<PowerLevelsRepairTask>, is_main_process: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        match task.schedule_if_needed(is_main_process).await {
            Ok(schedule) if schedule.needs_run() => {},
            Ok(_) => return,
            Err(e) => {
                error!("Failed to schedule power levels repair: {}", e);
                return;
            },
        }

        if let Err(e) = task.run().await {
            error!("Power levels repair stopped: {}", e);
        }
    })
}

fn object_entry<'a>(content: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    content.entry(key).or_insert_with(|| Value::Object(Map::new())).as_object_mut()
}

/// First local joined user holding admin power
fn local_admin(content: &mut Map<String, Value>, local_joined: &HashSet<String>) -> Option<String> {
    object_entry(content, "users")?
        .iter()
        .find(|(user_id, level)| local_joined.contains(*user_id) && level.as_i64() == Some(ADMIN_POWER_LEVEL))
        .map(|(user_id, _)| user_id.clone())
}

/// Let live location sharing be started at the `events_default` level
fn add_live_location_levels(content: &mut Map<String, Value>) -> bool {
    let events_default = content.get("events_default").cloned().unwrap_or(Value::from(0));
    let Some(events) = object_entry(content, "events") else {
        return false;
    };

    let mut changed = false;
    for event_type in [event_types::LOCATION_LIVE_SHARE, event_types::LOCATION_LIVE_SHARE_MSC] {
        if events.get(event_type).is_none_or(Value::is_null) {
            events.insert(event_type.to_string(), events_default.clone());
            changed = true;
        }
    }
    changed
}

/// Make every member of a direct room an admin
fn promote_members(content: &mut Map<String, Value>, members: &[String]) -> bool {
    let Some(users) = object_entry(content, "users") else {
        return false;
    };

    let mut changed = false;
    for member in members {
        if users.get(member).and_then(Value::as_i64) != Some(ADMIN_POWER_LEVEL) {
            users.insert(member.clone(), Value::from(ADMIN_POWER_LEVEL));
            changed = true;
        }
    }
    changed
}
