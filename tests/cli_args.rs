//! Integration tests for CLI argument handling
//!
//! Tests location flags, API key lookup and the --print mode.

use std::process::Command;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_cumbre"))
        .args(args)
        .env_remove("AEMET_API_KEY")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute cumbre")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cumbre"), "Help should mention cumbre");
    assert!(stdout.contains("--zona"), "Help should mention --zona flag");
    assert!(stdout.contains("--municipio"), "Help should mention --municipio flag");
}

#[test]
fn test_unknown_zone_prints_error_and_exits() {
    let output = run_cli(&["--zona", "9", "--print", "--api-key", "x"]);
    assert!(!output.status.success(), "Expected unknown zone to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unknown mountain zone"),
        "Should print error message about the zone: {}",
        stderr
    );
}

#[test]
fn test_missing_api_key_prints_error_and_exits() {
    let output = run_cli(&["--print"]);
    assert!(!output.status.success(), "Expected missing key to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("AEMET_API_KEY"),
        "Should tell how to pass the key: {}",
        stderr
    );
}

#[test]
fn test_zona_conflicts_with_municipio() {
    let output = run_cli(&["--zona", "0", "--municipio", "22170", "--api-key", "x"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot be used with"), "{}", stderr);
}

#[test]
fn test_print_fails_when_aemet_is_unreachable() {
    let output = run_cli(&[
        "--zona",
        "1",
        "--print",
        "--api-key",
        "x",
        "--base-url",
        "http://127.0.0.1:9/opendata/api",
        "--retries",
        "0",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"), "{}", stderr);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_print_zone_bulletin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prediccion/especifica/nivologica/1"))
        .and(header("api_key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "descripcion": "exito",
            "estado": 200,
            "datos": "https://opendata.aemet.es/opendata/sh/nivo",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/opendata/sh/nivo"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "1.- Estimación del nivel de peligro:\n\nNavarra: marcado (3)\n"
                .as_bytes()
                .to_vec(),
            "text/plain",
        ))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        run_cli(&[
            "--zona",
            "1",
            "--print",
            "--api-key",
            "secret",
            "--base-url",
            &uri,
        ])
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.starts_with("Pirineo Navarro y Aragonés"));
    assert!(stdout.contains("NIVEL DE PELIGRO"));
    assert!(stdout.contains("Navarra · Marcado"));
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use cumbre::cli::{parse_zona_arg, Cli, StartupConfig};
    use cumbre::data::ViewMode;

    #[test]
    fn test_cli_defaults_to_panticosa() {
        let cli = Cli::parse_from(["cumbre", "--api-key", "k"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert_eq!(config.mode, ViewMode::Locality);
        assert_eq!(config.location_id, "22170");
        assert!(!config.print);
    }

    #[test]
    fn test_cli_zona_starts_on_mountain_tab() {
        let cli = Cli::parse_from(["cumbre", "--api-key", "k", "--zona", "0"]);
        let config = StartupConfig::from_cli(&cli).unwrap();
        assert_eq!(config.mode, ViewMode::Zone);
        assert_eq!(config.location_id, "0");
    }

    #[test]
    fn test_parse_zona_arg_lists_valid_zones() {
        let err = parse_zona_arg("7").unwrap_err().to_string();
        assert!(err.contains("0 (Pirineo Catalán)"));
        assert!(err.contains("1 (Pirineo Navarro y Aragonés)"));
    }
}
