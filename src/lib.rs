//! dip-ui: the `dip` command line tool.
//!
//! CLI glue only; the package lifecycle lives in `dip-core`.

pub mod cli;
pub mod config_store;

pub use cli::{run, Cli, Commands};

/// Maps a failed command onto its exit status: the status code of the
/// underlying [`dip_core::DipError`] when there is one.
pub fn exit_status(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<dip_core::DipError>()
        .map(dip_core::DipError::status_code)
        .unwrap_or(dip_core::error::DIP_IOERROR)
}

/// Wraps a command line the parser rejected as [`dip_core::DipError::BadCommand`].
pub fn bad_command(error: &clap::Error) -> dip_core::DipError {
    dip_core::DipError::BadCommand(error.render().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn unknown_subcommand_maps_to_bad_command() {
        let parse_error = Cli::try_parse_from(["dip", "frobnicate"]).unwrap_err();
        let err = bad_command(&parse_error);
        assert!(matches!(err, dip_core::DipError::BadCommand(_)));
        assert_eq!(err.status_code(), dip_core::error::DIP_BADCMD);
        assert!(err.to_string().contains("frobnicate"));

        let wrapped = anyhow::Error::from(err);
        assert_eq!(exit_status(&wrapped), dip_core::error::DIP_BADCMD);
    }
}
