pub mod cargo_env {
    pub const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
}

pub mod common {
    /// Prefix of settings read from the environment, e.g. `SMREPORT_OUTPUT`.
    pub const ENV_PREFIX: &str = "SMREPORT";
    /// Exit status after being stopped by a signal.
    pub const INTERRUPTED_EXIT_CODE: i32 = 130;
}
