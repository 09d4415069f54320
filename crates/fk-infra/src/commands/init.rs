use colored::Colorize;
use fk_infra_aws::{AwsControlPlane, KeyMaterial, KeyStore, KmsEnvelopeCipher};
use fk_infra_config::Workspace;
use fk_infra_core::{ControlPlane, EnvironmentConfig};
use std::path::PathBuf;

pub async fn handle(environment_name: &str, region: &str) -> anyhow::Result<()> {
    let workspace = Workspace::current()?;

    println!(
        "{} {} ({})",
        "環境を初期化中:".blue(),
        environment_name.cyan(),
        region
    );

    let control_plane = AwsControlPlane::connect(region).await;

    let bucket = control_plane.ensure_bucket(environment_name).await?;
    println!("  {} 状態バケット: {}", "✓".green(), bucket.cyan());

    let key = control_plane.ensure_encryption_key(environment_name).await?;
    println!("  {} 暗号鍵: {}", "✓".green(), key.cyan());

    let defaults = EnvironmentConfig::with_defaults(environment_name, region, &key, &bucket);
    let (config_path, created) = write_default_config(&workspace, &defaults)?;
    if created {
        println!(
            "  {} 設定ファイルを作成: {}",
            "✓".green(),
            config_path.display().to_string().cyan()
        );
    } else {
        println!(
            "  {} 設定ファイルは既に存在します（上書きしません）: {}",
            "-".yellow(),
            config_path.display()
        );
    }

    let cipher = KmsEnvelopeCipher::new(control_plane.kms_client().clone(), &key);
    let keys = KeyStore::new(workspace.keys_dir(), &cipher);
    match keys.create_or_validate().await? {
        KeyMaterial::Generated => println!(
            "  {} SSH 鍵を生成して暗号化: {}",
            "✓".green(),
            keys.dir().display()
        ),
        KeyMaterial::Restored => println!(
            "  {} 既存の SSH 鍵を復号して検証: {}",
            "✓".green(),
            keys.dir().display()
        ),
    }

    println!();
    println!("{}", "✓ 初期化が完了しました".green().bold());
    println!("  次に {} で変更内容を確認してください", "fk-infra apply".cyan());
    Ok(())
}

/// Save `config` where `apply` will look for it (`FK_INFRA_CONFIG` or `fk-infra.yml`).
/// An existing file is kept. Returns the path and whether it was written.
fn write_default_config(
    workspace: &Workspace,
    config: &EnvironmentConfig,
) -> anyhow::Result<(PathBuf, bool)> {
    let path = workspace.config_path();
    if path.exists() {
        return Ok((path, false));
    }
    config.save(&path)?;
    Ok((path, true))
}
