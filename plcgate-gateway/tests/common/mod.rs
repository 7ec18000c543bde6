//! In-process Modbus TCP device for integration tests.

#![allow(dead_code)]

use std::future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{Server, accept_tcp_connection};

use plcgate_gateway::config::ModbusConfig;

/// Holding registers and coils shared between the test and the server.
#[derive(Clone)]
pub struct TestDevice {
    holding: Arc<Mutex<Vec<u16>>>,
    coils: Arc<Mutex<Vec<bool>>>,
}

impl TestDevice {
    pub fn new(registers: usize, coils: usize) -> Self {
        Self {
            holding: Arc::new(Mutex::new(vec![0; registers])),
            coils: Arc::new(Mutex::new(vec![false; coils])),
        }
    }

    pub fn set_registers(&self, start: usize, values: &[u16]) {
        self.holding.lock().unwrap()[start..start + values.len()].copy_from_slice(values);
    }

    pub fn registers(&self) -> Vec<u16> {
        self.holding.lock().unwrap().clone()
    }

    pub fn coils(&self) -> Vec<bool> {
        self.coils.lock().unwrap().clone()
    }
}

fn range(len: usize, addr: u16, count: usize) -> Result<std::ops::Range<usize>, ExceptionCode> {
    let start = usize::from(addr);
    let end = start + count;
    if end > len {
        return Err(ExceptionCode::IllegalDataAddress);
    }
    Ok(start..end)
}

impl tokio_modbus::server::Service for TestDevice {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                let holding = self.holding.lock().unwrap();
                range(holding.len(), addr, cnt.into())
                    .map(|r| Response::ReadHoldingRegisters(holding[r].to_vec()))
            }
            Request::WriteMultipleRegisters(addr, values) => {
                let mut holding = self.holding.lock().unwrap();
                range(holding.len(), addr, values.len()).map(|r| {
                    holding[r].copy_from_slice(&values);
                    Response::WriteMultipleRegisters(addr, values.len() as u16)
                })
            }
            Request::WriteSingleCoil(addr, value) => {
                let mut coils = self.coils.lock().unwrap();
                range(coils.len(), addr, 1).map(|r| {
                    coils[r.start] = value;
                    Response::WriteSingleCoil(addr, value)
                })
            }
            Request::WriteMultipleCoils(addr, values) => {
                let mut coils = self.coils.lock().unwrap();
                range(coils.len(), addr, values.len()).map(|r| {
                    coils[r].copy_from_slice(&values);
                    Response::WriteMultipleCoils(addr, values.len() as u16)
                })
            }
            _ => Err(ExceptionCode::IllegalFunction),
        };
        future::ready(res)
    }
}

/// Serve `device` on an already bound listener.
pub fn serve(listener: TcpListener, device: TestDevice) -> JoinHandle<()> {
    let server = Server::new(listener);

    let on_connected = move |stream, socket_addr| {
        let device = device.clone();
        async move { accept_tcp_connection(stream, socket_addr, move |_| Ok(Some(device.clone()))) }
    };
    let on_process_error = |err| {
        eprintln!("Test device error: {}", err);
    };

    tokio::spawn(async move {
        if let Err(e) = server.serve(&on_connected, on_process_error).await {
            eprintln!("Test device stopped: {}", e);
        }
    })
}

/// Start `device` on an OS-assigned local port.
pub async fn start(device: TestDevice) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, serve(listener, device))
}

/// A local port with nothing listening on it.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn modbus_config(port: u16) -> ModbusConfig {
    ModbusConfig {
        host: "127.0.0.1".to_string(),
        port,
        timeout_ms: 500,
        poll_interval_secs: 1,
        retry_delay_secs: 1,
        ..Default::default()
    }
}
