use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError};

use crate::error::{Chip8Error, Result};

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// Pending key events the front end may queue before it starts dropping them.
pub const KEY_QUEUE_DEPTH: usize = 16;

/// What the interpreter needs from a screen and keypad. Implementations own
/// the pixels; the interpreter only hands over coordinates and sprite rows.
pub trait Display {
    fn clear(&mut self) -> Result<()>;

    /// XOR `rows` onto the screen at (x, y), returns whether any lit pixel
    /// was turned off.
    fn sprite(&mut self, x: u8, y: u8, rows: &[u8]) -> Result<bool>;

    /// Oldest queued key notification, without blocking. Front ends send one
    /// for every key that is down, once per frame.
    fn poll_key(&mut self) -> Option<u8>;

    /// Blocks until a key arrives. `None` once the display has shut down.
    fn wait_key(&mut self) -> Option<u8>;

    /// Diagnostic overlay.
    fn debug(&mut self, _line: &str) -> Result<()> {
        Ok(())
    }

    fn is_open(&mut self) -> bool;
}

/// Monochrome pixel buffer with CHIP-8 sprite semantics.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    bit_buffer: Vec<bool>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            bit_buffer: vec![false; WIDTH * HEIGHT],
        }
    }

    pub fn clear_buffer(&mut self) {
        self.bit_buffer.fill(false);
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.bit_buffer[y * WIDTH + x]
    }

    /// The start position wraps around the screen, the sprite itself is
    /// clipped at the right and bottom edges.
    pub fn paint(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        let (x, y) = (x as usize % WIDTH, y as usize % HEIGHT);
        let mut vf = false;
        for (i, row) in sprite.iter().enumerate() {
            let ny = y + i;
            if ny >= HEIGHT {
                break;
            }
            for j in 0..8 {
                let nx = x + j;
                if nx >= WIDTH {
                    break;
                }
                if (row >> (7 - j)) & 1 == 0 {
                    continue;
                }
                let index = ny * WIDTH + nx;
                if self.bit_buffer[index] {
                    vf = true;
                }
                self.bit_buffer[index] ^= true;
            }
        }
        vf
    }

    /// 0RGB pixels for a window backend.
    pub fn pixels(&self, on: u32, off: u32) -> impl Iterator<Item = u32> + '_ {
        self.bit_buffer
            .iter()
            .map(move |lit| if *lit { on } else { off })
    }
}

#[derive(Debug)]
pub enum Request {
    Clear,
    Sprite { x: u8, y: u8, rows: Vec<u8> },
    Debug(String),
}

/// Interpreter end of the display channels. Owned by the execution thread.
pub struct DisplayClient {
    requests: Sender<Request>,
    collisions: Receiver<bool>,
    keys: Receiver<u8>,
    quit: Receiver<()>,
}

/// Front end end of the display channels.
pub struct DisplayServer {
    pub requests: Receiver<Request>,
    pub collisions: SyncSender<bool>,
    pub keys: SyncSender<u8>,
    // dropped on shutdown, which is the quit signal
    pub quit: Sender<()>,
}

pub fn channel() -> (DisplayClient, DisplayServer) {
    let (req_tx, req_rx) = mpsc::channel();
    let (col_tx, col_rx) = mpsc::sync_channel(1);
    let (key_tx, key_rx) = mpsc::sync_channel(KEY_QUEUE_DEPTH);
    let (quit_tx, quit_rx) = mpsc::channel();
    (
        DisplayClient {
            requests: req_tx,
            collisions: col_rx,
            keys: key_rx,
            quit: quit_rx,
        },
        DisplayServer {
            requests: req_rx,
            collisions: col_tx,
            keys: key_tx,
            quit: quit_tx,
        },
    )
}

impl Display for DisplayClient {
    fn clear(&mut self) -> Result<()> {
        self.requests
            .send(Request::Clear)
            .map_err(|_| Chip8Error::DisplayDisconnected)
    }

    fn sprite(&mut self, x: u8, y: u8, rows: &[u8]) -> Result<bool> {
        self.requests
            .send(Request::Sprite {
                x,
                y,
                rows: rows.to_vec(),
            })
            .map_err(|_| Chip8Error::DisplayDisconnected)?;
        // rendezvous: nothing proceeds until the collision bit is known
        self.collisions
            .recv()
            .map_err(|_| Chip8Error::DisplayDisconnected)
    }

    fn poll_key(&mut self) -> Option<u8> {
        self.keys.try_recv().ok()
    }

    fn wait_key(&mut self) -> Option<u8> {
        self.keys.recv().ok()
    }

    fn debug(&mut self, line: &str) -> Result<()> {
        self.requests
            .send(Request::Debug(line.to_string()))
            .map_err(|_| Chip8Error::DisplayDisconnected)
    }

    fn is_open(&mut self) -> bool {
        matches!(self.quit.try_recv(), Err(TryRecvError::Empty) | Ok(()))
    }
}

/// No screen at all. Reports itself closed, so a machine driving it stops
/// straight away.
#[derive(Debug, Default)]
pub struct Headless;

impl Display for Headless {
    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    fn sprite(&mut self, _x: u8, _y: u8, _rows: &[u8]) -> Result<bool> {
        Ok(false)
    }

    fn poll_key(&mut self) -> Option<u8> {
        None
    }

    fn wait_key(&mut self) -> Option<u8> {
        None
    }

    fn is_open(&mut self) -> bool {
        false
    }
}
