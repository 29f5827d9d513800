fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = std::path::PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let repo_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .ok_or("missing repo root")?
        .to_path_buf();
    let proto_dir = repo_root.join("proto");
    let proto = proto_dir.join("speechkit/stt/v3/stt_service.proto");
    println!("cargo:rerun-if-changed={}", proto.display());

    // Prefer a system protoc when one is configured.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_build::configure()
        .build_client(true)
        .build_server(false)
        .compile_protos(&[proto], &[proto_dir])?;
    Ok(())
}
