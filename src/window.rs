use std::sync::mpsc::{RecvTimeoutError, TrySendError};
use std::time::{Duration, Instant};

use log::{info, trace, warn};
use minifb::{Key, Scale, Window, WindowOptions};

use crate::display::{DisplayServer, FrameBuffer, Request, HEIGHT, WIDTH};
use crate::error::Result;
use crate::keyboard::Keymap;

const TITLE: &str = "chipvm - ESC to exit";
const FRAME: Duration = Duration::from_micros(16600);
const LIT: u32 = 0x00_7F_FF;
const UNLIT: u32 = 0x00_00_00;

/// minifb front end. Must be built and shown on the thread that owns the
/// window, while the interpreter runs elsewhere and talks to it through the
/// display channels.
pub struct Screen {
    window: Window,
    fb: FrameBuffer,
    pixel_buffer: Vec<u32>,
    server: DisplayServer,
    keymap: Keymap,
}

impl Screen {
    pub fn new(server: DisplayServer, keymap: Keymap) -> Result<Self> {
        let mut window = Window::new(
            TITLE,
            WIDTH,
            HEIGHT,
            WindowOptions {
                scale: Scale::X16,
                ..WindowOptions::default()
            },
        )?;
        // paced by show() instead, so draw requests are never held up
        window.limit_update_rate(None);
        Ok(Self {
            window,
            fb: FrameBuffer::new(),
            pixel_buffer: vec![UNLIT; WIDTH * HEIGHT],
            server,
            keymap,
        })
    }

    /// Runs the render and key capture loop until the window is closed,
    /// Escape is pressed or the interpreter hangs up. Dropping the server
    /// channels on return is what tells the interpreter to stop.
    pub fn show(mut self) -> Result<()> {
        info!("display up");
        while self.window.is_open() && !self.window.is_key_down(Key::Escape) {
            if !self.service_requests(Instant::now() + FRAME) {
                info!("interpreter hung up");
                break;
            }
            self.capture_keys();
            self.sync()?;
        }
        info!("display down");
        Ok(())
    }

    // handles requests as they come in until the frame deadline, false once
    // the interpreter side is gone
    fn service_requests(&mut self, deadline: Instant) -> bool {
        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match self.server.requests.recv_timeout(timeout) {
                Ok(Request::Clear) => self.fb.clear_buffer(),
                Ok(Request::Sprite { x, y, rows }) => {
                    let collided = self.fb.paint(x, y, &rows);
                    if self.server.collisions.send(collided).is_err() {
                        return false;
                    }
                }
                Ok(Request::Debug(line)) => {
                    self.window.set_title(&format!("{TITLE} | {line}"));
                }
                Err(RecvTimeoutError::Timeout) => return true,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    // one notification per frame for every key that is down, the engine
    // holds each for a little over a frame
    fn capture_keys(&mut self) {
        for key in self.window.get_keys() {
            let Some(num) = self.keymap.key_to_num(key) else {
                trace!("can't map {key:?} to a keypad key");
                continue;
            };
            match self.server.keys.try_send(num) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("key queue full, dropped {num:#x}"),
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }

    fn sync(&mut self) -> Result<()> {
        for (dst, src) in self
            .pixel_buffer
            .iter_mut()
            .zip(self.fb.pixels(LIT, UNLIT))
        {
            *dst = src;
        }
        self.window
            .update_with_buffer(&self.pixel_buffer, WIDTH, HEIGHT)?;
        Ok(())
    }
}
