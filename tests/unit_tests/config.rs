use crate::unit_tests::{rupture_matrix_json, test_output_dir, BASIS_FUNCTIONS};
use seisflux::basis::Alignment;
use seisflux::config::{generate, write_declarations, GeneratorConfig};
use seisflux::matrices::rupture_matrix_file_name;
use seisflux::tensor::TensorName;
use seisflux::Error;
use serde_json::json;
use std::path::Path;

fn small_config(matrices_dir: &Path, simulations: usize) -> GeneratorConfig {
    GeneratorConfig {
        order: 2,
        matrices_dir: matrices_dir.to_path_buf(),
        dynamic_rupture_method: "quadrature".to_string(),
        elastic_quantities: 3,
        anelastic_mechanisms: 1,
        quantities_per_mechanism: 2,
        multiple_simulations: simulations,
        alignment: Alignment::default(),
    }
}

fn matrices_dir(name: &str) -> std::path::PathBuf {
    let dir = test_output_dir(name);
    std::fs::write(
        dir.join(rupture_matrix_file_name("quadrature", 2)),
        rupture_matrix_json(9, BASIS_FUNCTIONS),
    )
    .unwrap();
    dir
}

#[test]
fn config_defaults() {
    let config = GeneratorConfig::from_json_str(
        r#"{ "order": 3, "matrices_dir": "matrices", "dynamic_rupture_method": "cellaverage" }"#,
    )
    .unwrap();
    assert_eq!(config.order, 3);
    assert_eq!(config.dynamic_rupture_method, "cellaverage");
    assert_eq!(config.elastic_quantities, 9);
    assert_eq!(config.anelastic_mechanisms, 0);
    assert_eq!(config.multiple_simulations, 1);
    assert_eq!(config.alignment, Alignment::default());
    assert_eq!(config.extended_quantities(), 9);

    let config = GeneratorConfig::from_json_str(
        r#"{
            "order": 4,
            "matrices_dir": "matrices",
            "dynamic_rupture_method": "quadrature",
            "anelastic_mechanisms": 3,
            "alignment": { "vector_bytes": 32, "real_bytes": 4 }
        }"#,
    )
    .unwrap();
    assert_eq!(config.extended_quantities(), 9 + 3 * 6);
    assert_eq!(config.alignment.vector_bytes(), 32);

    assert!(GeneratorConfig::from_json_str(r#"{ "order": 3 }"#).is_err());
}

#[test]
fn config_rejects_invalid_alignment() {
    for alignment in [
        r#"{ "vector_bytes": 0, "real_bytes": 8 }"#,
        r#"{ "vector_bytes": 12, "real_bytes": 8 }"#,
        r#"{ "vector_bytes": 64, "real_bytes": 0 }"#,
    ] {
        let data = format!(
            r#"{{ "order": 2, "matrices_dir": "matrices", "dynamic_rupture_method": "quadrature", "alignment": {} }}"#,
            alignment
        );
        assert!(GeneratorConfig::from_json_str(&data).is_err());
    }
}

#[test]
fn generate_rejects_huge_orders() {
    let dir = matrices_dir("generate-huge-order");
    let mut config = small_config(&dir, 1);
    config.order = usize::MAX;
    let error = generate(&config).unwrap_err();
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::InvalidOrder { .. })));
}

#[test]
fn config_from_file() {
    let dir = test_output_dir("config-file");
    let path = dir.join("config.json");
    let data = json!({
        "order": 2,
        "matrices_dir": dir,
        "dynamic_rupture_method": "quadrature",
        "multiple_simulations": 8,
    });
    std::fs::write(&path, data.to_string()).unwrap();
    let config = GeneratorConfig::from_json_file(&path).unwrap();
    assert_eq!(config.matrices_dir, dir);
    assert_eq!(config.multiple_simulations, 8);

    assert!(GeneratorConfig::from_json_file(dir.join("missing.json")).is_err());
}

#[test]
fn generate_declares_all_units() {
    let dir = matrices_dir("generate");
    let generator = generate(&small_config(&dir, 1)).unwrap();
    assert_eq!(generator.len(), 8);
    assert_eq!(generator.num_kernels(), 38);

    let q = generator.tensor(&TensorName::new("Q").unwrap()).unwrap();
    assert_eq!(q.shape(), &[BASIS_FUNCTIONS, 3]);
    assert!(q.align_stride());
    let qext = generator.tensor(&TensorName::new("Qext").unwrap()).unwrap();
    assert_eq!(qext.shape(), &[BASIS_FUNCTIONS, 5]);
    let star = generator.tensor(&TensorName::with_group("star", &[0]).unwrap()).unwrap();
    assert_eq!(star.shape(), &[3, 5]);
}

#[test]
fn generate_batched() {
    let dir = matrices_dir("generate-batched");
    let generator = generate(&small_config(&dir, 4)).unwrap();
    assert_eq!(generator.num_kernels(), 38);

    let q = generator.tensor(&TensorName::new("Q").unwrap()).unwrap();
    assert_eq!(q.shape(), &[4, BASIS_FUNCTIONS, 3]);
    let projection = generator
        .tensor(&TensorName::with_group("V3mTo2n", &[0, 3]).unwrap())
        .unwrap();
    assert_eq!(projection.shape(), &[BASIS_FUNCTIONS, 9]);
    assert!(generator.render().contains("QFortran['kp'] = Q['skp'] * multSimToFirstSim['s']"));
}

#[test]
fn generate_rejects_invalid_configurations() {
    let dir = matrices_dir("generate-invalid");

    let mut config = small_config(&dir, 1);
    config.dynamic_rupture_method = "bogus".to_string();
    let error = generate(&config).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::UnknownRuptureMethod { method }) if method == "bogus"
    ));

    let config = small_config(&dir, 0);
    assert!(generate(&config).is_err());

    // There is no matrix file for order 3
    let mut config = small_config(&dir, 1);
    config.order = 3;
    assert!(generate(&config).is_err());

    let config = small_config(&dir.join("missing"), 1);
    assert!(generate(&config).is_err());
}

#[test]
fn written_declarations() {
    let dir = matrices_dir("write");
    let config = small_config(&dir, 1);
    let generator = generate(&config).unwrap();
    let output = dir.join("out");
    write_declarations(&generator, &config.alignment, &output).unwrap();

    let rendered = std::fs::read_to_string(output.join("kernels.txt")).unwrap();
    assert_eq!(rendered, generator.render());
    assert!(rendered.starts_with("kernel computeFluxSolverLocal: "));
    assert!(rendered.contains("family nodalFlux [4x4]:\n"));

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["alignment"]["vector_bytes"], 64);
    assert_eq!(manifest["kernels"].as_array().unwrap().len(), 6);
    assert_eq!(manifest["families"][0]["name"], "godunovState");
    assert_eq!(manifest["families"][0]["members"][0]["mode"], "assign");
    assert_eq!(manifest["families"][0]["members"][1]["mode"], "accumulate");
    assert_eq!(manifest["families"][1]["members"][0]["prefetch"], "I");

    let q = manifest["tensors"]
        .as_array()
        .unwrap()
        .iter()
        .find(|tensor| tensor["name"] == "Q")
        .unwrap();
    assert_eq!(q["shape"], json!([BASIS_FUNCTIONS, 3]));
    assert_eq!(q["aligned_shape"], json!([8, 3]));
}
