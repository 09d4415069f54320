mod commands;
mod reporter;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fk-infra")]
#[command(about = "YAML ひとつから、AWS 環境をまるごと構築する", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 状態バケットと暗号鍵を作成し、設定ファイルと SSH 鍵を生成
    Init {
        /// 環境名（バケット名・クラスタ名にも使われる）
        #[arg(long)]
        environment_name: String,
        /// AWS リージョン
        #[arg(long, env = "AWS_REGION")]
        region: String,
    },
    /// 設定ファイルに従って環境を構築（--approve なしでは plan のみ）
    Apply {
        /// 変更を適用する
        #[arg(long)]
        approve: bool,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Init {
            environment_name,
            region,
        } => commands::init::handle(&environment_name, &region).await,
        Commands::Apply { approve } => commands::apply::handle(approve).await,
        Commands::Version => {
            println!("fk-infra {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
