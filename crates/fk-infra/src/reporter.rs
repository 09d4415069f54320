//! Console progress output

use colored::Colorize;
use fk_infra_core::{PipelineEvent, Reporter, Tier};

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

fn tier_label(tier: Tier) -> &'static str {
    match tier {
        Tier::Network => "ネットワーク",
        Tier::Search => "Elasticsearch",
        Tier::Databases => "データベース",
        Tier::Compute => "Kubernetes",
    }
}

impl Reporter for ConsoleReporter {
    fn event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Rendered { tier, file_name } => println!(
                "  {} {} 定義を生成: {}",
                "✓".green(),
                tier_label(*tier),
                file_name.cyan()
            ),
            PipelineEvent::Planned => println!("  {} plan 完了", "✓".green()),
            PipelineEvent::Applied => println!("  {} apply 完了", "✓".green()),
            PipelineEvent::ApplySkipped => {
                println!("  {} apply をスキップ（未承認）", "-".yellow())
            }
            PipelineEvent::ComputeSkipped => println!(
                "  {} VPC がまだ無いため {} をスキップ",
                "-".yellow(),
                tier_label(Tier::Compute)
            ),
            PipelineEvent::ClusterDefined { cluster, confirmed } => {
                let mode = if *confirmed { "更新" } else { "プレビュー" };
                println!("  {} クラスタ {} を{}", "✓".green(), cluster.cyan(), mode)
            }
            PipelineEvent::ClusterReady { cluster } => {
                println!("  {} クラスタ {} が稼働中", "✓".green(), cluster.cyan())
            }
            PipelineEvent::ClusterTimedOut { cluster } => println!(
                "  {} クラスタ {} の起動待ちがタイムアウトしました",
                "✗".red(),
                cluster.cyan()
            ),
            PipelineEvent::InClusterApplied { cluster, count } => println!(
                "  {} クラスタ {} に {}個のリソースを適用",
                "✓".green(),
                cluster.cyan(),
                count
            ),
        }
    }
}
