use std::fs;
use std::io::{self, prelude::*};
use std::path;

use env_logger;
use log;
use rand::Rng;

use bin_ext_sort::{ExternalSorter, ExternalSorterBuilder};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let mut rng = rand::thread_rng();
    let mut input_writer = io::BufWriter::new(fs::File::create("input.bin").unwrap());
    for _ in 0..1_000_000 {
        input_writer.write_all(&rng.gen::<u32>().to_ne_bytes()).unwrap();
    }
    input_writer.flush().unwrap();

    let sorter: ExternalSorter<u32> = ExternalSorterBuilder::new()
        .with_tmp_dir(path::Path::new("./"))
        .with_segment_size(1024 * 1024)
        .with_max_workers(4)
        .build()
        .unwrap();

    let stats = sorter
        .sort(path::Path::new("input.bin"), path::Path::new("output.bin"))
        .unwrap();

    log::info!("{:?}", stats);
}
