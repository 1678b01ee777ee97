use std::path::PathBuf;

use clap::Parser;
use typed_bytesize::ByteSizeIec;

#[derive(Parser)]
pub struct Cli {
    /// Host directory whose regular files get packed into the image
    #[arg(long, short)]
    pub source: Option<PathBuf>,

    /// Image file path
    #[arg(long, short = 'O')]
    pub image: PathBuf,

    /// Image size, e.g. `4MiB`
    #[arg(long, default_value = "4MiB")]
    pub size: ByteSizeIec,

    /// Block size in bytes
    #[arg(long, default_value_t = 512)]
    pub block_size: usize,
}
