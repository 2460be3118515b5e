//! Tests for the rider-pubsub binary

#[cfg(test)]
mod tests {
    use std::{fs, path::Path, process::Command};

    use tempfile::TempDir;

    const CUSTOM_TOPICS: &str = r#"
        [[topics]]
        name = "alerts"
        kind = "text"

        [[topics]]
        name = "fleet-positions"
        kind = "rider-location"
        partitions = 2

        [[listeners]]
        topic = "alerts"
        group_id = "ops"

        [[listeners]]
        topic = "fleet-positions"
        group_id = "dispatch"
    "#;

    fn run(config: &Path, args: &[&str]) -> String {
        let output = Command::new(env!("CARGO_BIN_EXE_rider-pubsub"))
            .arg("--config")
            .arg(config)
            .args(["--linger-ms", "500"])
            .args(args)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "{}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn write_config(temp_dir: &TempDir) -> std::path::PathBuf {
        let path = temp_dir.path().join("pipeline.toml");
        fs::write(&path, CUSTOM_TOPICS).unwrap();
        path
    }

    #[test]
    fn test_send1_targets_configured_topic() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_config(&temp_dir);

        let stdout = run(&config, &["send1", "--topic", "alerts", "--message", "hi"]);
        assert!(stdout.contains("Message sent: hi"), "{}", stdout);
        assert!(stdout.contains("alerts/ops#1: delivered 1,"), "{}", stdout);
    }

    #[test]
    fn test_send2_targets_configured_topic() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_config(&temp_dir);

        let stdout = run(&config, &["send2", "--topic", "fleet-positions"]);
        assert!(stdout.contains("Message sent: rider123"), "{}", stdout);
        assert!(
            stdout.contains("fleet-positions/dispatch#2: delivered 1,"),
            "{}",
            stdout
        );
    }

    #[test]
    fn test_topics_lists_codecs() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_config(&temp_dir);

        let stdout = run(&config, &["topics"]);
        assert!(stdout.contains("Codecs:"), "{}", stdout);
        assert!(stdout.contains("- alerts ->"), "{}", stdout);
        assert!(stdout.contains("- fleet-positions ->"), "{}", stdout);
    }
}
