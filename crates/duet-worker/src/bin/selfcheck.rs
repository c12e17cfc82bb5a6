use std::path::Path;
use std::process::Command;

use duet_storage::{R2Client, R2Config};
use duet_worker::ComposerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    dotenvy::dotenv().ok();
    let config = ComposerConfig::from_env();

    println!(
        "duet-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;

    let paths = config.tool_paths()?;
    ensure_tool("ffmpeg", &paths.ffmpeg)?;
    ensure_tool("ffprobe", &paths.ffprobe)?;

    // Storage is only checked when configured; dry runs do not need it.
    match R2Config::from_env() {
        Ok(r2) => {
            R2Client::new(&r2).check_connectivity().await?;
            println!("duet-selfcheck: bucket {} reachable", r2.bucket_name);
        }
        Err(e) => println!("duet-selfcheck: skipping storage check ({})", e),
    }

    println!("duet-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;

    let probe = path.join(".duet-selfcheck");
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("work dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_tool(name: &str, binary: &Path) -> anyhow::Result<()> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available at {}: {}", name, binary.display(), e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            name,
            output.status
        ));
    }
    println!("duet-selfcheck: {} at {}", name, binary.display());
    Ok(())
}
