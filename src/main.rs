use clap::{Arg, ArgMatches, Command};
use rejoin_coordinator::{Config, CoordinatorError, Node};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), CoordinatorError> {
    let matches = cli().get_matches();

    let level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!("Starting rejoin coordinator");

    let config = config_from_matches(&matches)?;
    info!(
        "Node configuration: {}",
        serde_json::to_string(&config).unwrap_or_else(|_| format!("{:?}", config))
    );

    let node = Node::new(config).await?;
    node.start().await
}

fn cli() -> Command {
    let path = |name: &'static str, help: &'static str| {
        Arg::new(name)
            .long(name)
            .help(help)
            .value_parser(clap::value_parser!(PathBuf))
    };

    Command::new("rejoind")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Announces this control-plane node, refreshes the load balancer and repairs stale membership")
        .arg(path("shared-dir", "Shared storage directory holding announcements and templates").default_value(rejoin_coordinator::config::DEFAULT_SHARED_DIR))
        .arg(
            Arg::new("port")
                .long("port")
                .help("Trigger port, used both to listen and to reach peers")
                .default_value("9999"),
        )
        .arg(
            Arg::new("interface")
                .long("interface")
                .help("Network interface whose IPv4 address identifies this node")
                .default_value(rejoin_coordinator::config::DEFAULT_INTERFACE),
        )
        .arg(Arg::new("hostname").long("hostname").help("Override the OS hostname"))
        .arg(Arg::new("address").long("address").help("Override the interface address"))
        .arg(path("base-config", "Load-balancer base template [default: <shared-dir>/haproxy.cfg.base]"))
        .arg(path("rendered-config", "Rendered load-balancer config [default: <shared-dir>/haproxy.cfg]"))
        .arg(path("install-config", "Live load-balancer config path"))
        .arg(Arg::new("service").long("service").help("Load-balancer systemd unit"))
        .arg(path("etcd-cert", "etcd client certificate; its absence skips etcd repair"))
        .arg(path("etcd-key", "etcd client key"))
        .arg(path("etcd-ca", "etcd CA certificate"))
        .arg(path("kubeconfig", "Orchestrator kubeconfig; its absence skips node repair"))
        .arg(path("ready-marker", "Readiness marker created once startup is done"))
        .arg(
            Arg::new("notify-timeout-secs")
                .long("notify-timeout-secs")
                .help("Per-peer trigger timeout")
                .default_value("5"),
        )
        .arg(
            Arg::new("command-timeout-secs")
                .long("command-timeout-secs")
                .help("Timeout for systemctl, etcdctl and kubectl")
                .default_value("120"),
        )
        .arg(Arg::new("systemctl").long("systemctl").help("systemctl binary"))
        .arg(Arg::new("etcdctl").long("etcdctl").help("etcdctl binary"))
        .arg(Arg::new("kubectl").long("kubectl").help("kubectl binary"))
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("Log filter used when RUST_LOG is unset")
                .default_value("info"),
        )
}

fn parse<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>, CoordinatorError>
where
    T::Err: std::fmt::Display,
{
    matches
        .get_one::<String>(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| CoordinatorError::InvalidConfig(format!("Invalid {}: {}", name, e)))
        })
        .transpose()
}

fn timeout_ms(matches: &ArgMatches, name: &str) -> Result<Option<u64>, CoordinatorError> {
    parse::<u64>(matches, name)?
        .map(|secs| {
            secs.checked_mul(1000).ok_or_else(|| {
                CoordinatorError::InvalidConfig(format!("Invalid {}: {} is too large", name, secs))
            })
        })
        .transpose()
}

fn config_from_matches(matches: &ArgMatches) -> Result<Config, CoordinatorError> {
    let shared_dir = matches
        .get_one::<PathBuf>("shared-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(rejoin_coordinator::config::DEFAULT_SHARED_DIR));
    let mut config = Config::new(shared_dir);

    let path = |name: &str| matches.get_one::<PathBuf>(name).cloned();
    let text = |name: &str| matches.get_one::<String>(name).cloned();

    if let Some(port) = parse::<u16>(matches, "port")? {
        config.port = port;
    }
    if let Some(interface) = text("interface") {
        config.interface = interface;
    }
    config.hostname = text("hostname");
    config.address = parse::<Ipv4Addr>(matches, "address")?;

    if let Some(p) = path("base-config") {
        config.base_config = p;
    }
    if let Some(p) = path("rendered-config") {
        config.rendered_config = p;
    }
    if let Some(p) = path("install-config") {
        config.install_config = p;
    }
    if let Some(unit) = text("service") {
        config.service_unit = unit;
    }
    if let Some(p) = path("etcd-cert") {
        config.etcd_cert = p;
    }
    if let Some(p) = path("etcd-key") {
        config.etcd_key = p;
    }
    if let Some(p) = path("etcd-ca") {
        config.etcd_ca = p;
    }
    if let Some(p) = path("kubeconfig") {
        config.kubeconfig = p;
    }
    if let Some(p) = path("ready-marker") {
        config.ready_marker = p;
    }
    if let Some(ms) = timeout_ms(matches, "notify-timeout-secs")? {
        config.notify_timeout_ms = ms;
    }
    if let Some(ms) = timeout_ms(matches, "command-timeout-secs")? {
        config.command_timeout_ms = ms;
    }
    if let Some(bin) = text("systemctl") {
        config.systemctl = bin;
    }
    if let Some(bin) = text("etcdctl") {
        config.etcdctl = bin;
    }
    if let Some(bin) = text("kubectl") {
        config.kubectl = bin;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_layout() {
        let config = config_from_matches(&cli().get_matches_from(["rejoind"])).unwrap();
        assert_eq!(config.shared_dir, PathBuf::from("/share/phylactery"));
        assert_eq!(config.port, 9999);
        assert_eq!(config.interface, "net0");
        assert_eq!(config.notify_timeout_ms, 5_000);
        assert!(config.address.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let matches = cli().get_matches_from([
            "rejoind",
            "--shared-dir",
            "/mnt/share",
            "--port",
            "8099",
            "--address",
            "10.0.0.7",
            "--hostname",
            "cp-7",
            "--ready-marker",
            "/tmp/ready",
        ]);
        let config = config_from_matches(&matches).unwrap();

        assert_eq!(config.base_config, PathBuf::from("/mnt/share/haproxy.cfg.base"));
        assert_eq!(config.port, 8099);
        assert_eq!(config.address, Some(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(config.hostname.as_deref(), Some("cp-7"));
        assert_eq!(config.ready_marker, PathBuf::from("/tmp/ready"));
    }

    #[test]
    fn oversized_timeout_is_a_config_error() {
        let matches = cli().get_matches_from([
            "rejoind",
            "--command-timeout-secs",
            "18446744073709551615",
        ]);
        assert!(matches!(
            config_from_matches(&matches),
            Err(CoordinatorError::InvalidConfig(msg)) if msg.contains("command-timeout-secs")
        ));

        let matches = cli().get_matches_from(["rejoind", "--notify-timeout-secs", "2"]);
        assert_eq!(config_from_matches(&matches).unwrap().notify_timeout_ms, 2_000);
    }

    #[test]
    fn bad_address_is_a_config_error() {
        let matches = cli().get_matches_from(["rejoind", "--address", "10.0.0"]);
        assert!(matches!(
            config_from_matches(&matches),
            Err(CoordinatorError::InvalidConfig(_))
        ));
    }
}
