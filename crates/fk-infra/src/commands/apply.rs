use crate::reporter::ConsoleReporter;
use colored::Colorize;
use fk_infra_aws::{AwsControlPlane, KeyStore, KmsEnvelopeCipher, load_sdk_config};
use fk_infra_config::Workspace;
use fk_infra_core::{ClusterState, EnvironmentConfig, RunSummary, Sequencer};
use fk_infra_kube::KubeApplier;
use fk_infra_tools::{BinaryCache, Kops, Terraform};

pub async fn handle(approve: bool) -> anyhow::Result<()> {
    let workspace = Workspace::current()?;
    let config_path = workspace.find_config_file()?;
    let config = EnvironmentConfig::load(&config_path)?;
    let spec = &config.spec;

    println!(
        "{} {} ({})",
        "環境を構築中:".blue(),
        spec.environment_name.cyan(),
        spec.region
    );
    if !approve {
        println!("  {}", "--approve なし: plan のみ実行します".yellow());
    }

    let sdk_config = load_sdk_config(&spec.region).await;
    let control_plane = AwsControlPlane::new(&sdk_config, &spec.region);

    let cipher = KmsEnvelopeCipher::new(control_plane.kms_client().clone(), &spec.encryption_key);
    let keys = KeyStore::new(workspace.keys_dir(), &cipher);
    keys.decrypt_keys().await?;

    let cache = BinaryCache::new(workspace.ensure_cache_dir()?, workspace.root());
    let terraform = Terraform::new(cache.clone(), &spec.tools.terraform_version);
    let kops = Kops::new(cache, &spec.tools.kops_version, &spec.config_bucket);
    let applier = KubeApplier::new();
    let reporter = ConsoleReporter;

    let summary = Sequencer::new(
        &terraform,
        &kops,
        &control_plane,
        &applier,
        keys.public_key_path(),
    )?
    .with_reporter(&reporter)
    .run(spec, approve)
    .await?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("サマリー:");
    println!("  定義ファイル: {}", summary.staged.join(", "));
    println!(
        "  適用: {}",
        if summary.applied {
            "済".green()
        } else {
            "未（plan のみ）".yellow()
        }
    );

    if summary.compute_skipped {
        println!("  クラスタ: {}", "VPC 未作成のためスキップ".yellow());
    }
    for cluster in &summary.clusters {
        let state = match cluster.state {
            ClusterState::Previewed => "プレビューのみ".yellow(),
            ClusterState::Ready { resources } => {
                format!("稼働中（{}個のリソースを適用）", resources).green()
            }
            ClusterState::TimedOut => "タイムアウト".red(),
        };
        println!("    - {} {}", cluster.name.cyan(), state);
    }

    println!();
    println!("{}", "✓ 完了しました".green().bold());
}
