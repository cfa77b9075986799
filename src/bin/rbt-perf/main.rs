use rand::prelude::random;
use structopt::StructOpt;

use rbt::{err_at, Result, Strategy};

macro_rules! get_property {
    ($value:ident, $name:expr, $method:ident, $default:expr) => {
        $value
            .get($name)
            .map(|x| x.$method().unwrap_or($default))
            .unwrap_or($default)
    };
}

mod index;

/// Command line options.
#[derive(Clone, StructOpt)]
pub struct Opt {
    #[structopt(long = "seed", default_value = "0")]
    seed: u64,

    #[structopt(long = "profile", default_value = "")]
    profile: String,

    #[structopt(
        long = "strategy",
        help = "one of global, rw, coupled, leave it out to run all three"
    )]
    strategy: Option<Strategy>,
}

fn main() {
    let mut opts = Opt::from_args();
    if opts.seed == 0 {
        opts.seed = random();
    }

    let strategies = match opts.strategy {
        Some(strategy) => vec![strategy],
        None => vec![Strategy::Global, Strategy::ReadWrite, Strategy::Coupled],
    };

    for strategy in strategies.into_iter() {
        if let Err(err) = index::perf(opts.clone(), strategy) {
            println!("rbt-perf: error {}", err);
            std::process::exit(1);
        }
    }
}

fn load_profile(opts: &Opt) -> Result<toml::Value> {
    use std::{fs, str::from_utf8};

    if opts.profile.is_empty() {
        return Ok(toml::Value::Table(toml::map::Map::new()));
    }

    let data = err_at!(IOError, fs::read(&opts.profile), "profile {:?}", opts.profile)?;
    let text = err_at!(InvalidInput, from_utf8(&data), "profile must be toml")?;
    err_at!(InvalidInput, text.parse::<toml::Value>())
}
