use pdm_data_api::exporter::{self, onnx::ModelProto, ExportError};
use pdm_data_api::ExporterConfig;
use prost::Message;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const BINARY_93: &str = include_str!("fixtures/binary_93.txt");

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn config(model_path: PathBuf, output_path: PathBuf) -> ExporterConfig {
    ExporterConfig {
        model_path,
        output_path,
        feature_count: 93,
        input_name: "float_input".to_string(),
    }
}

#[test]
fn test_export_declares_unbounded_batch_by_93_input() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("onnx_models").join("LightGBM_Tmodel.onnx");
    let summary = exporter::export(&config(fixture_path("binary_93.txt"), output.clone())).unwrap();

    let bytes = fs::read(&output).unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(bytes.len(), summary.bytes_written);

    let model = ModelProto::decode(bytes.as_slice()).unwrap();
    let graph = model.graph.expect("graph");
    assert_eq!(graph.input.len(), 1);
    assert_eq!(graph.input[0].name, "float_input");
    let dims = graph.input[0].r#type.as_ref().unwrap().tensor_dims().unwrap();
    assert_eq!(dims, vec![None, Some(93)]);

    let outputs: Vec<_> = graph.output.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(outputs, vec!["label", "probabilities"]);
    assert!(model.opset_import.iter().any(|o| o.domain == "ai.onnx.ml"));
}

#[test]
fn test_missing_model_writes_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.onnx");
    let err = exporter::export(&config(dir.path().join("absent.txt"), output.clone())).unwrap_err();

    assert!(matches!(err, ExportError::ReadModel { .. }));
    assert!(!output.exists());
}

#[test]
fn test_export_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.txt");
    fs::write(&model_path, BINARY_93).unwrap();

    let a = dir.path().join("a.onnx");
    let b = dir.path().join("b.onnx");
    exporter::export(&config(model_path.clone(), a.clone())).unwrap();
    exporter::export(&config(model_path, b.clone())).unwrap();
    assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
}

#[test]
fn test_binary_reports_success() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("model.onnx");
    let result = Command::new(env!("CARGO_BIN_EXE_pdm-export-onnx"))
        .arg("--model")
        .arg(fixture_path("binary_93.txt"))
        .arg("--output")
        .arg(&output)
        .env("RUST_LOG", "off")
        .output()
        .expect("run exporter");

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Model converted to ONNX format"));
    assert!(output.exists());
}

#[test]
fn test_binary_fails_on_missing_model() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("model.onnx");
    let result = Command::new(env!("CARGO_BIN_EXE_pdm-export-onnx"))
        .arg("--model")
        .arg(dir.path().join("absent.txt"))
        .arg("--output")
        .arg(&output)
        .env("RUST_LOG", "off")
        .output()
        .expect("run exporter");

    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn test_binary_fails_on_feature_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("model.onnx");
    let result = Command::new(env!("CARGO_BIN_EXE_pdm-export-onnx"))
        .arg("--model")
        .arg(fixture_path("binary_93.txt"))
        .arg("--output")
        .arg(&output)
        .arg("--features")
        .arg("94")
        .env("RUST_LOG", "off")
        .output()
        .expect("run exporter");

    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("93"));
    assert!(!output.exists());
}
