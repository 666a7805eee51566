fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Prefer a protoc from the environment, fall back to the vendored one.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    tonic_build::configure().compile_protos(&["proto/host.proto"], &["proto"])?;
    Ok(())
}
