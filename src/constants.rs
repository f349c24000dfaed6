//! Common constants used throughout the roll generator.

/// Supported configuration file names, tried in order.
pub const CONFIG_FILES: [&str; 3] = ["roll.json", "roll.yml", "roll.yaml"];

/// Empty marker file that keeps otherwise empty directories under version control.
pub const KEEP_FILE: &str = ".keep";

/// Bytes of entropy drawn for every generated secret.
pub const SECRET_BYTES: usize = 64;

/// Exit status reported for a pipeline that halted on a failed step.
pub const EXIT_FAILED: i32 = 1;

/// Exit status reported for a pipeline cancelled between steps.
pub const EXIT_ABORTED: i32 = 130;

/// Name of the step list executed by a plain `roll <APP_PATH>` invocation.
pub const DEFAULT_RECIPE: &str = "roll";
