use crate::commands::parse_date;
use crate::db::store::Store;
use crate::libs::messages::Message;
use crate::libs::view::View;
use crate::msg_info;
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct BlocksArgs {
    /// Number of blocks to show, newest first
    #[arg(short, long, default_value_t = 20)]
    limit: usize,

    /// Show every block of one day instead: `today`, `yesterday` or YYYY-MM-DD
    #[arg(short, long, conflicts_with = "limit")]
    date: Option<String>,
}

pub async fn cmd(args: BlocksArgs) -> Result<()> {
    let store = Store::new()?;

    let blocks = match &args.date {
        Some(date) => store.blocks.get_blocks_for_date(parse_date(date)?)?,
        None => store.blocks.get_recent_blocks(args.limit)?,
    };

    if blocks.is_empty() {
        msg_info!(Message::NoBlocksFound);
        return Ok(());
    }

    View::blocks(&blocks)
}
