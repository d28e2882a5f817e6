fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::env::var("OUT_DIR")?;

    // Prefer a protoc from the environment, fall back to the vendored binary
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_prost_build::configure()
        .file_descriptor_set_path(format!("{}/health_descriptor.bin", out_dir))
        .compile_protos(&["proto/health_service.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/health_service.proto");
    println!("cargo:rerun-if-changed=build.rs");

    Ok(())
}
