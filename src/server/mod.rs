pub mod api;

use crate::cli::ServeArgs;
use self::api::AppState;
use std::error::Error;
use std::net::SocketAddr;
use log::{ info, error };

pub struct Server {
    addr: String,
    state: AppState,
    tls: Option<(String, String)>,
}

fn tls_paths(args: &ServeArgs) -> Result<Option<(String, String)>, Box<dyn Error + Send + Sync>> {
    if !args.enable_tls {
        info!("TLS not enabled. Running plain HTTP server.");
        return Ok(None);
    }
    match (&args.tls_cert_path, &args.tls_key_path) {
        (Some(cert_path), Some(key_path)) => {
            info!(
                "TLS enabled. Loading certificate from '{}' and key from '{}'",
                cert_path,
                key_path
            );
            Ok(Some((cert_path.clone(), key_path.clone())))
        }
        (Some(_), None) | (None, Some(_)) => {
            error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
            Err("Missing TLS certificate or key path".into())
        }
        (None, None) => {
            error!("--enable-tls was set but no certificate/key paths provided.");
            Err("TLS enabled without cert/key".into())
        }
    }
}

impl Server {
    pub fn new(
        addr: String,
        state: AppState,
        args: &ServeArgs
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let tls = tls_paths(args)?;
        Ok(Self { addr, state, tls })
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid server address '{}': {}", self.addr, e))?;
        api::start_http_server(addr, self.state.clone(), self.tls.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ Cli, Command };
    use clap::Parser;

    fn serve_args(extra: &[&str]) -> ServeArgs {
        let mut argv = vec!["hct-assist", "serve"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Serve(args) => args,
            Command::Chat(_) => panic!("expected serve"),
        }
    }

    #[test]
    fn tls_disabled_by_default() {
        assert_eq!(tls_paths(&serve_args(&[])).unwrap(), None);
    }

    #[test]
    fn tls_requires_both_paths() {
        let args = serve_args(&["--enable-tls", "--tls-cert-path", "cert.pem"]);
        assert!(tls_paths(&args).is_err());

        let args = serve_args(&["--enable-tls", "--tls-cert-path", "cert.pem", "--tls-key-path", "key.pem"]);
        assert_eq!(
            tls_paths(&args).unwrap(),
            Some(("cert.pem".to_string(), "key.pem".to_string()))
        );
    }
}
