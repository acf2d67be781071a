pub mod power_levels_repair;

pub use power_levels_repair::{
    FIX_POWER_LEVELS_ACTION, PowerLevelsRepairTask, ROOM_BATCH_SIZE, RepairSchedule, start_power_levels_repair_task,
};
