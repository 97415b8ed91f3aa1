//! A small device dashboard served by the microreq-rs core.
//!
//! Pass a JSON configuration file as the first argument to override the
//! defaults, e.g. `{"addr": "0.0.0.0:8081", "buffer_size": 512}`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use microreq_rs::{FsImage, HttpServer, LargePayload, Method, ServerConfig, Service, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Led {
    on: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the logger
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ServerConfig {
            addr: "127.0.0.1:8081".parse()?,
            ..ServerConfig::default()
        },
    };

    // A file image like the ones flashed next to the firmware
    let image = FsImage::pack(&[
        ("index.html", b"<html><body><h1>{{title}}</h1><p>LED is {{led}}</p></body></html>".as_slice()),
        ("style.css", b"body { font-family: sans-serif; }".as_slice()),
    ])?;
    let image_len = image.len() as u64;

    let mut service = Service::new(config);
    service.mount_image(image, 0)?;

    let led = Arc::new(AtomicBool::new(false));

    // The dashboard: a templated file from the image
    let state = Arc::clone(&led);
    service.serve("/", Method::GET, move |req| {
        let on = state.load(Ordering::Relaxed);
        let _ = req.template("title", "Device dashboard");
        let _ = req.template("led", if on { "on" } else { "off" });
        req.send_file("index.html");
        String::new()
    })?;

    // Query parameters
    service.serve("/hello", Method::GET, |req| {
        let name = match req.get_param_value("name") {
            "" => "World",
            name => name,
        };
        format!("Hello, {name}!")
    })?;

    // JSON in and out
    let state = Arc::clone(&led);
    service.serve("/api/led", Method::ALL, move |req| {
        if req.method() == Some(Method::POST) {
            match req.json::<Led>() {
                Ok(led) => state.store(led.on, Ordering::Relaxed),
                Err(_) => {
                    req.set_status(StatusCode::BAD_REQUEST);
                    return "expected {\"on\": bool}".to_string();
                }
            }
        }
        req.set_json(&Led { on: state.load(Ordering::Relaxed) })
            .unwrap_or_default()
    })?;

    // The raw image, streamed from storage in buffer-sized chunks
    service.serve("/image.bin", Method::GET, move |req| {
        req.set_mime("application/octet-stream");
        req.stream(LargePayload::new(0, image_len));
        String::new()
    })?;

    service.serve("404", Method::ALL, |req| {
        format!("<h1>Nothing at {}</h1>", req.path())
    })?;

    info!("Starting server on http://{}", service.config.addr);

    // Start the server
    let server = HttpServer::new(service);
    server.start().await?;

    Ok(())
}
