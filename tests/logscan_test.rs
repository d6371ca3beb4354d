//! Integration tests for post-hoc failure detection over a log directory.

use showerpool::logscan::{Markers, Verdict, scan};
use uuid::Uuid;

#[test]
fn scan_judges_every_err_log_in_name_order() {
    let dir = std::env::temp_dir()
        .join("showerpool-test")
        .join(Uuid::new_v4().to_string());
    std::fs::create_dir_all(dir.join("nested")).unwrap();

    std::fs::write(dir.join("output_5.0_000001_clsim.err"), "INFO done\n").unwrap();
    std::fs::write(
        dir.join("output_5.0_000002_clsim.err"),
        "Traceback (most recent call last):\njson.decoder.JSONDecodeError: Expecting value\n",
    )
    .unwrap();
    std::fs::write(dir.join("output_5.0_000003_clsim.err"), "Killed\n").unwrap();
    std::fs::write(dir.join("output_5.0_000002_clsim.out"), "Exception\n").unwrap();
    std::fs::write(dir.join("nested/output_x.err"), "Exception\n").unwrap();

    let verdicts = scan(&dir, &Markers::default()).unwrap();
    let keys: Vec<&str> = verdicts.iter().map(|v| v.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["5.0_000001_clsim", "5.0_000002_clsim", "5.0_000003_clsim"]
    );

    assert_eq!(verdicts[0].verdict, Verdict::Clean);
    assert_eq!(
        verdicts[1].verdict,
        Verdict::Failed {
            marker: "json.decoder.JSONDecodeError".to_string()
        }
    );
    assert_eq!(
        verdicts[2].verdict,
        Verdict::Unknown {
            last_line: "Killed".to_string()
        }
    );
}

#[test]
fn custom_markers_replace_the_defaults() {
    let dir = std::env::temp_dir()
        .join("showerpool-test")
        .join(Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("output_a.err"), "FATAL: no GCD file\n").unwrap();
    std::fs::write(dir.join("output_b.err"), "Exception: ignored here\n").unwrap();

    let markers = Markers {
        failure: vec!["FATAL".to_string()],
        ok: vec![],
    };
    let verdicts = scan(&dir, &markers).unwrap();

    assert!(verdicts[0].is_failed());
    assert!(matches!(verdicts[1].verdict, Verdict::Unknown { .. }));

    let json = serde_json::to_value(&verdicts[0]).unwrap();
    assert_eq!(json["key"], "a");
    assert_eq!(json["verdict"], "failed");
    assert_eq!(json["marker"], "FATAL");
}
