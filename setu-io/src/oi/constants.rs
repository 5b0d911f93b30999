//! Constants for the Roomba Open Interface

// Mode commands
pub const OP_START: u8 = 128; // Start OI, robot enters Passive
pub const OP_BAUD: u8 = 129;
pub const OP_SAFE: u8 = 131;
pub const OP_FULL: u8 = 132;

// Cleaning commands
pub const OP_POWER: u8 = 133; // Power down, back to Passive
pub const OP_SPOT: u8 = 134;
pub const OP_CLEAN: u8 = 135;
pub const OP_MAX: u8 = 136;
pub const OP_SEEK_DOCK: u8 = 143;
pub const OP_SCHEDULE: u8 = 167;
pub const OP_SET_DAY_TIME: u8 = 168;

// Actuator commands
pub const OP_DRIVE: u8 = 137; // velocity(2) radius(2), big-endian signed
pub const OP_LEDS: u8 = 139;
pub const OP_PLAY: u8 = 141;
pub const OP_PWM_MOTORS: u8 = 144; // main brush, side brush, vacuum
pub const OP_DRIVE_PWM: u8 = 146; // right(2) left(2)
pub const OP_BUTTONS: u8 = 165;

// Input commands
pub const OP_SENSORS: u8 = 142;
pub const OP_STREAM: u8 = 148;
pub const OP_QUERY_LIST: u8 = 149;
pub const OP_PAUSE_RESUME_STREAM: u8 = 150;

/// First byte of every telemetry stream frame
pub const STREAM_HEADER: u8 = 19;

/// Telemetry frame cadence of the robot
pub const STREAM_PERIOD_MS: u64 = 15;

// Sensor packet ids
pub const BUMPS: u8 = 7;
pub const WALL: u8 = 8;
pub const CLIFF_L: u8 = 9;
pub const CLIFF_FL: u8 = 10;
pub const CLIFF_FR: u8 = 11;
pub const CLIFF_R: u8 = 12;
pub const VIRTUAL_WALL: u8 = 13;
pub const OVER_CURRENT: u8 = 14;
pub const DIRT: u8 = 15;
pub const UNUSED_16: u8 = 16;
pub const IR_OMNI: u8 = 17;
pub const BUTTONS: u8 = 18;
pub const DISTANCE: u8 = 19;
pub const ANGLE: u8 = 20;
pub const CHARGING_STATE: u8 = 21;
pub const VOLTAGE: u8 = 22;
pub const CURRENT: u8 = 23;
pub const TEMPERATURE: u8 = 24;
pub const BATTERY_CHARGE: u8 = 25;
pub const BATTERY_CAPACITY: u8 = 26;
pub const WALL_SIGNAL: u8 = 27;
pub const CLIFF_L_SIGNAL: u8 = 28;
pub const CLIFF_FL_SIGNAL: u8 = 29;
pub const CLIFF_FR_SIGNAL: u8 = 30;
pub const CLIFF_R_SIGNAL: u8 = 31;
pub const UNUSED_32: u8 = 32;
pub const UNUSED_33: u8 = 33;
pub const CHARGING_SOURCES: u8 = 34;
pub const OI_MODE: u8 = 35;
pub const SONG_NUMBER: u8 = 36;
pub const SONG_PLAYING: u8 = 37;
pub const STREAM_PACKETS: u8 = 38;
pub const REQUESTED_VELOCITY: u8 = 39;
pub const REQUESTED_RADIUS: u8 = 40;
pub const REQUESTED_VELOCITY_R: u8 = 41;
pub const REQUESTED_VELOCITY_L: u8 = 42;
pub const ENCODER_R: u8 = 43;
pub const ENCODER_L: u8 = 44;
pub const LIGHT_BUMPER: u8 = 45;
pub const LIGHT_BUMP_L: u8 = 46;
pub const LIGHT_BUMP_FL: u8 = 47;
pub const LIGHT_BUMP_CL: u8 = 48;
pub const LIGHT_BUMP_CR: u8 = 49;
pub const LIGHT_BUMP_FR: u8 = 50;
pub const LIGHT_BUMP_R: u8 = 51;
pub const IR_CHAR_L: u8 = 52;
pub const IR_CHAR_R: u8 = 53;
pub const MOTOR_CURRENT_L: u8 = 54;
pub const MOTOR_CURRENT_R: u8 = 55;
pub const MOTOR_CURRENT_MAIN_BRUSH: u8 = 56;
pub const MOTOR_CURRENT_SIDE_BRUSH: u8 = 57;
pub const STASIS: u8 = 58;

pub const FIRST_SENSOR_ID: u8 = BUMPS;
pub const LAST_SENSOR_ID: u8 = STASIS;

/// The six light-bump proximity sensors, left to right
pub const LIGHT_BUMP_IDS: [u8; 6] = [
    LIGHT_BUMP_L,
    LIGHT_BUMP_FL,
    LIGHT_BUMP_CL,
    LIGHT_BUMP_CR,
    LIGHT_BUMP_FR,
    LIGHT_BUMP_R,
];

/// Most ids a stream or list query may name (every sensor packet once)
pub const MAX_LIST_IDS: usize = (LAST_SENSOR_ID - FIRST_SENSOR_ID + 1) as usize;

// LED bits for OP_LEDS
pub const LED_DEBRIS: u8 = 0x01;
pub const LED_SPOT: u8 = 0x02;
pub const LED_DOCK: u8 = 0x04;
pub const LED_CHECK_ROBOT: u8 = 0x08;

// Button bits for OP_BUTTONS
pub const BUTTON_CLEAN: u8 = 0x01;
pub const BUTTON_SPOT: u8 = 0x02;
pub const BUTTON_DOCK: u8 = 0x04;
pub const BUTTON_MINUTE: u8 = 0x08;
pub const BUTTON_HOUR: u8 = 0x10;
pub const BUTTON_DAY: u8 = 0x20;
pub const BUTTON_SCHEDULE: u8 = 0x40;
pub const BUTTON_CLOCK: u8 = 0x80;

// Drive limits
pub const MAX_VELOCITY_MM_S: i32 = 500;
pub const MAX_RADIUS_MM: i32 = 2000;
pub const RADIUS_STRAIGHT: i32 = 32767;
pub const RADIUS_STRAIGHT_ALT: i32 = 32768;
pub const MAX_DRIVE_PWM: i32 = 255;
pub const MAX_BRUSH_PWM: i32 = 127;
pub const MAX_VACUUM_PWM: i32 = 127;

/// Highest song slot the robot stores
pub const MAX_SONG_NUMBER: u8 = 4;

/// Highest valid baud code (115200)
pub const MAX_BAUD_CODE: u8 = 11;
