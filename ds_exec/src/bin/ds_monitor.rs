//! # DS Monitor
//!
//! Subscribes to the DS outputs and prints them to the terminal. An optional argument restricts
//! the output to a single topic, for example `ds_monitor vel_filtered`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{env, sync::{Arc, atomic::{AtomicBool, Ordering}}};

use color_eyre::{Result, eyre::{WrapErr, eyre}};
use comms_if::{
    ds::DsOutput,
    net::{MonitoredSocket, NetParams, SocketOptions, zmq},
};

fn main() -> Result<()> {
    color_eyre::install()?;

    let args: Vec<String> = env::args().collect();
    let topic = match args.len() {
        1 => String::new(),
        2 => args[1].clone(),
        n => return Err(eyre!("Expected zero or one argument, found {}", n - 1))
    };

    let net_params: NetParams = util::params::load("net.toml")
        .wrap_err("Could not load net params")?;

    let socket_options = SocketOptions {
        block_on_first_connect: false,
        recv_timeout: 100,
        linger: 0,
        ..Default::default()
    };

    let ctx = zmq::Context::new();
    let socket = MonitoredSocket::new(
        &ctx,
        zmq::SUB,
        socket_options,
        &net_params.ds_monitor_endpoint
    ).wrap_err("Could not connect to the DS outputs")?;

    socket.set_subscribe(topic.as_bytes())
        .wrap_err("Could not subscribe to the DS outputs")?;

    let run = Arc::new(AtomicBool::new(true));
    {
        let run = run.clone();
        ctrlc::set_handler(move || run.store(false, Ordering::Relaxed))
            .wrap_err("Failed to set the Ctrl-C handler")?;
    }

    println!("Monitoring {}", net_params.ds_monitor_endpoint);

    while run.load(Ordering::Relaxed) {
        let frame = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                eprintln!("Non UTF-8 message");
                continue
            },
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => return Err(e).wrap_err("Error receiving from the DS outputs")
        };

        match DsOutput::from_frame(&frame) {
            Ok(DsOutput::Path(p)) => match (p.first(), p.last()) {
                (Some(first), Some(last)) => println!(
                    "path: {} points from {:?} to {:?}", p.len(), first, last
                ),
                _ => println!("path: empty")
            },
            Ok(msg) => println!("{:?}", msg),
            Err(e) => eprintln!("Could not decode \"{}\": {}", frame, e)
        }
    }

    Ok(())
}
