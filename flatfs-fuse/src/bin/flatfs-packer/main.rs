mod cli;

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use cli::Cli;
use flatfs::{FileMode, FlatFileSystem};
use flatfs_fuse::BlockFile;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("image={:?} size={}", cli.image, cli.size);

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.image)?;
    fd.set_len(cli.size.0)?;

    let block_count = (cli.size.0 as usize) / cli.block_size;
    let dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd, cli.block_size, block_count));
    let mut ffs = FlatFileSystem::format(&dev);

    let Some(source) = &cli.source else {
        return Ok(());
    };

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .expect("source file name is not UTF-8");

        let mut data = Vec::new();
        File::open(entry.path())?.read_to_end(&mut data)?;
        log::info!("packing {name:?}: {} bytes", data.len());

        let mut file = ffs.create(&name, FileMode::ReadWrite).unwrap();
        let wrote = file.write(&data, &mut ffs).unwrap();
        assert_eq!(wrote, data.len(), "image ran out of space");
        ffs.close(file).unwrap();
    }

    Ok(())
}
