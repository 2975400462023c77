// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::clap::{
    Arg,
    ArgMatches,
    Command,
};
use ::std::{
    cell::RefCell,
    rc::Rc,
};
use ::swirl::{
    early_return,
    early_return_call,
    runtime::logging,
    AsyncCoroutine,
    AsyncReturn,
    Asynchronous,
    Config,
    Routine,
    SharedEventLoop,
    SharedScheduler,
};

//======================================================================================================================
// Program Arguments
//======================================================================================================================

/// Program Arguments
#[derive(Debug)]
pub struct ProgramArguments {
    /// Argument handed to the chained call.
    value: i64,
    /// Number of iterations of the squaring loop.
    count: i64,
    /// Path to a configuration file.
    config: Option<String>,
}

/// Associate functions for Program Arguments
impl ProgramArguments {
    const DEFAULT_VALUE: i64 = 3;
    const DEFAULT_COUNT: i64 = 5;

    /// Parses the program arguments from the command line interface.
    pub fn new(app_name: &'static str, app_author: &'static str, app_about: &'static str) -> Result<Self> {
        let matches: ArgMatches = Command::new(app_name)
            .author(app_author)
            .about(app_about)
            .version(swirl::VERSION)
            .arg(
                Arg::new("value")
                    .long("value")
                    .value_parser(clap::value_parser!(i64))
                    .required(false)
                    .value_name("N")
                    .help("Sets the value passed through the call chain"),
            )
            .arg(
                Arg::new("count")
                    .long("count")
                    .value_parser(clap::value_parser!(i64))
                    .required(false)
                    .value_name("N")
                    .help("Sets the number of loop iterations"),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_parser(clap::value_parser!(String))
                    .required(false)
                    .value_name("PATH")
                    .help("Sets the configuration file"),
            )
            .get_matches();

        let mut args: ProgramArguments = ProgramArguments {
            value: Self::DEFAULT_VALUE,
            count: Self::DEFAULT_COUNT,
            config: None,
        };

        if let Some(value) = matches.get_one::<i64>("value") {
            args.value = *value;
        }

        if let Some(count) = matches.get_one::<i64>("count") {
            if *count < 0 {
                anyhow::bail!("count must be non-negative (count={})", count);
            }
            args.count = *count;
        }

        if let Some(config) = matches.get_one::<String>("config") {
            args.config = Some(config.clone());
        }

        Ok(args)
    }
}

//======================================================================================================================
// Application
//======================================================================================================================

/// Application
struct Application {
    event_loop: SharedEventLoop,
    max_turns: usize,
    /// Squares its argument.
    square: AsyncReturn<i64, i64>,
    /// Returns early with a call to `square`.
    second: AsyncReturn<i64, i64>,
}

/// Associated Functions for the Application
impl Application {
    pub fn new(config: &Config) -> Result<Self> {
        let event_loop: SharedEventLoop = SharedEventLoop::from_config(config)?;
        let max_turns: usize = config.max_turns()?;

        let square: AsyncReturn<i64, i64> = AsyncReturn::new(
            "square",
            event_loop.scheduler(),
            Routine::coroutine(|a: i64| {
                AsyncCoroutine::boxed(move |_co| async move {
                    println!("running square");
                    Ok(Some(early_return(a * a)))
                })
            }),
        )?;

        let square_: AsyncReturn<i64, i64> = square.clone();
        let second: AsyncReturn<i64, i64> = AsyncReturn::new(
            "second",
            event_loop.scheduler(),
            Routine::coroutine(move |a: i64| {
                let call = square_.call(a);
                AsyncCoroutine::boxed(move |_co| async move {
                    println!("running second");
                    Ok(Some(early_return_call(call)))
                })
            }),
        )?;

        Ok(Self {
            event_loop,
            max_turns,
            square,
            second,
        })
    }

    /// Waits on `second`, which hands its result over to `square`.
    pub fn run_chain(&self, value: i64) -> Result<Vec<i64>> {
        let results: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
        let results_: Rc<RefCell<Vec<i64>>> = results.clone();
        let second: AsyncReturn<i64, i64> = self.second.clone();
        let first: Asynchronous<i64, i64> = Asynchronous::new(
            "first",
            self.scheduler(),
            Routine::coroutine(move |a: i64| {
                let call = second.call(a);
                let results: Rc<RefCell<Vec<i64>>> = results_.clone();
                AsyncCoroutine::boxed(move |co| async move {
                    println!("> running first");
                    let foo: i64 = co.wait_value(call).await?;
                    println!("first got result: {}", foo);
                    results.borrow_mut().push(foo);
                    println!("> done first");
                    Ok(None)
                })
            }),
        );

        first.call(value)?;
        self.event_loop.run_until_idle(self.max_turns)?;
        let results: Vec<i64> = results.borrow().clone();
        Ok(results)
    }

    /// Waits on `square` once per iteration.
    pub fn run_loop(&self, count: i64) -> Result<Vec<i64>> {
        let results: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
        let results_: Rc<RefCell<Vec<i64>>> = results.clone();
        let square: AsyncReturn<i64, i64> = self.square.clone();
        let test_loop: Asynchronous<i64, i64> = Asynchronous::new(
            "test_loop",
            self.scheduler(),
            Routine::coroutine(move |n: i64| {
                let square: AsyncReturn<i64, i64> = square.clone();
                let results: Rc<RefCell<Vec<i64>>> = results_.clone();
                AsyncCoroutine::boxed(move |co| async move {
                    for i in 0..n {
                        let x: i64 = co.wait_value(square.call(i)).await?;
                        println!("{}", x);
                        results.borrow_mut().push(x);
                    }
                    Ok(None)
                })
            }),
        );

        test_loop.call(count)?;
        self.event_loop.run_until_idle(self.max_turns)?;
        let results: Vec<i64> = results.borrow().clone();
        Ok(results)
    }

    fn scheduler(&self) -> SharedScheduler {
        self.event_loop.scheduler()
    }
}

//======================================================================================================================

fn main() -> Result<()> {
    let args: ProgramArguments = ProgramArguments::new(
        "square-chain",
        "Microsoft Corporation",
        "Chains deferred coroutine calls on a single-threaded event loop.",
    )?;

    let config: Config = match &args.config {
        Some(path) => Config::new(path)?,
        None => Config::default(),
    };
    logging::initialize_with(&config.log_spec()?);

    let app: Application = Application::new(&config)?;
    let chain: Vec<i64> = app.run_chain(args.value)?;
    let squares: Vec<i64> = app.run_loop(args.count)?;
    println!("chain={:?} squares={:?}", chain, squares);
    Ok(())
}
