//! Raw terminal byte translation.
//!
//! A small state machine over the byte stream the terminal writes to the
//! input handle: control bytes, escape sequences (arrows, function keys,
//! back-tab), xterm mouse reports, and printable keys. Each decoded event
//! pushes a semantic [`Input`] and updates the keyboard state map.

use super::keyboard::{Button, KeyboardState};
use super::{Criteria, Input};
use crate::geometry::Position;

const ESC: u8 = 0x1b;
const CTRL_BACKSPACE: u8 = 8;
const CTRL_TAB: u8 = 9;
const CTRL_ENTER: u8 = 10;

/// Decodes terminal bytes into semantic inputs while tracking button and
/// pointer state across batches.
#[derive(Debug, Default)]
pub struct Translator {
    /// Keyboard and mouse button state.
    pub keyboard: KeyboardState,
    /// Last reported pointer position (0-based).
    pub mouse: Position,
}

impl Translator {
    /// Create a translator with an idle state map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one batch of raw bytes, appending decoded inputs to
    /// `out`. Begins a state-map batch first so edge queries compare
    /// against the previous call.
    pub fn translate(&mut self, bytes: &[u8], out: &mut Vec<Input>) {
        self.keyboard.begin_batch();

        let mut i = 0usize;
        while i < bytes.len() {
            let byte = bytes[i];

            if byte == ESC {
                i += self.translate_escape(&bytes[i..], out);
                continue;
            }

            if (1..=26).contains(&byte) {
                self.translate_control(byte, out);
                i += 1;
                continue;
            }

            // Uppercase letters and the punctuation run before digits imply
            // a held Shift.
            if byte.is_ascii_uppercase() || (b'!'..=b'/').contains(&byte) {
                self.keyboard.press(Button::Shift);
                out.push(Input::at(Criteria::SHIFT, self.mouse));
            }
            out.push(Input {
                criteria: Criteria::KEY_PRESS,
                x: self.mouse.x,
                y: self.mouse.y,
                data: byte,
            });
            i += 1;
        }
    }

    /// Bytes 1..=26 are Control+letter, with backspace, tab, and enter
    /// carved out.
    fn translate_control(&mut self, byte: u8, out: &mut Vec<Input>) {
        match byte {
            CTRL_BACKSPACE => {
                self.keyboard.press(Button::Backspace);
                out.push(Input::at(Criteria::BACKSPACE, self.mouse));
            }
            CTRL_TAB => {
                self.keyboard.press(Button::Tab);
                out.push(Input::at(Criteria::TAB, self.mouse));
            }
            CTRL_ENTER => {
                self.keyboard.press(Button::Enter);
                out.push(Input {
                    criteria: Criteria::ENTER,
                    x: self.mouse.x,
                    y: self.mouse.y,
                    data: b'\n',
                });
            }
            _ => {
                // Shift the byte back up into the letter range.
                self.keyboard.press(Button::Control);
                out.push(Input::at(Criteria::CONTROL, self.mouse));
                out.push(Input {
                    criteria: Criteria::KEY_PRESS,
                    x: self.mouse.x,
                    y: self.mouse.y,
                    data: byte - 1 + b'a',
                });
            }
        }
    }

    /// Translate a sequence starting at an ESC byte; returns how many
    /// bytes were consumed.
    fn translate_escape(&mut self, bytes: &[u8], out: &mut Vec<Input>) -> usize {
        // Lone ESC at the end of the batch is the Escape key itself.
        if bytes.len() < 2 {
            self.keyboard.press(Button::Escape);
            out.push(Input::at(Criteria::ESCAPE, self.mouse));
            return 1;
        }

        match bytes[1] {
            b'[' => self.translate_csi(bytes, out),
            b'O' => self.translate_ss3(bytes, out),
            other => {
                // ESC followed by anything else is Alt+byte.
                self.keyboard.press(Button::Alt);
                out.push(Input {
                    criteria: Criteria::ALT,
                    x: self.mouse.x,
                    y: self.mouse.y,
                    data: other,
                });
                2
            }
        }
    }

    /// `ESC [` sequences: arrows, back-tab, tilde-terminated function
    /// keys, mouse reports.
    fn translate_csi(&mut self, bytes: &[u8], out: &mut Vec<Input>) -> usize {
        let Some(&selector) = bytes.get(2) else {
            // A dangling CSI decodes as Escape.
            self.keyboard.press(Button::Escape);
            out.push(Input::at(Criteria::ESCAPE, self.mouse));
            return 2;
        };
        match selector {
            b'A' => {
                self.keyboard.press(Button::Up);
                out.push(Input::at(Criteria::UP, self.mouse));
                3
            }
            b'B' => {
                self.keyboard.press(Button::Down);
                out.push(Input::at(Criteria::DOWN, self.mouse));
                3
            }
            b'C' => {
                self.keyboard.press(Button::Right);
                out.push(Input::at(Criteria::RIGHT, self.mouse));
                3
            }
            b'D' => {
                self.keyboard.press(Button::Left);
                out.push(Input::at(Criteria::LEFT, self.mouse));
                3
            }
            b'Z' => {
                // Back-tab: Shift and Tab arrive as one sequence.
                self.keyboard.press(Button::Shift);
                self.keyboard.press(Button::Tab);
                out.push(Input::at(Criteria::SHIFT, self.mouse));
                out.push(Input::at(Criteria::TAB, self.mouse));
                3
            }
            b'M' => self.translate_mouse(bytes, out),
            b'0'..=b'9' => self.translate_tilde_function(bytes, out),
            _ => {
                self.keyboard.press(Button::Escape);
                out.push(Input::at(Criteria::ESCAPE, self.mouse));
                3
            }
        }
    }

    /// `ESC O P..S` are F1..F4.
    fn translate_ss3(&mut self, bytes: &[u8], out: &mut Vec<Input>) -> usize {
        let Some(&selector) = bytes.get(2) else {
            self.keyboard.press(Button::Escape);
            out.push(Input::at(Criteria::ESCAPE, self.mouse));
            return 2;
        };
        if (b'P'..=b'S').contains(&selector) {
            let n = selector - b'P' + 1;
            self.keyboard.press(Button::Function(n));
            out.push(Input::at(Criteria::function(n), self.mouse));
        }
        3
    }

    /// `ESC [ <digits> ~` function keys (F5..=F12 in the common layout).
    fn translate_tilde_function(&mut self, bytes: &[u8], out: &mut Vec<Input>) -> usize {
        let mut value = 0u16;
        let mut consumed = 2usize;
        while let Some(&digit) = bytes.get(consumed) {
            if digit.is_ascii_digit() {
                value = value * 10 + u16::from(digit - b'0');
                consumed += 1;
            } else {
                break;
            }
        }
        if bytes.get(consumed) == Some(&b'~') {
            consumed += 1;
            let n = match value {
                11..=15 => Some((value - 10) as u8),
                17..=21 => Some((value - 11) as u8),
                23..=26 => Some((value - 12) as u8),
                28..=29 => Some((value - 13) as u8),
                31..=32 => Some((value - 15) as u8),
                _ => None,
            };
            if let Some(n) = n.filter(|&n| (1..=16).contains(&n)) {
                self.keyboard.press(Button::Function(n));
                out.push(Input::at(Criteria::function(n), self.mouse));
            }
        }
        consumed
    }

    /// `ESC [ M b x y`: an xterm mouse report. Coordinates arrive biased
    /// by 32 and 1-based; modifier and motion bits ride in `b`.
    fn translate_mouse(&mut self, bytes: &[u8], out: &mut Vec<Input>) -> usize {
        let (Some(&b), Some(&x), Some(&y)) = (bytes.get(3), bytes.get(4), bytes.get(5)) else {
            return bytes.len().min(6);
        };
        let mut mask = b;

        if mask & 4 != 0 {
            self.keyboard.press(Button::Shift);
            out.push(Input::at(Criteria::SHIFT, self.mouse));
            mask &= !4;
        }
        if mask & 8 != 0 {
            self.keyboard.press(Button::Super);
            out.push(Input::at(Criteria::SUPER, self.mouse));
            mask &= !8;
        }
        if mask & 16 != 0 {
            self.keyboard.press(Button::Control);
            out.push(Input::at(Criteria::CONTROL, self.mouse));
            mask &= !16;
        }

        // Coordinates accompany every report.
        self.mouse.x = i32::from(x) - 33;
        self.mouse.y = i32::from(y) - 33;

        let wheel = mask & 64 != 0 && mask & 32 != 0;
        if wheel {
            match mask & 3 {
                0 => out.push(Input::at(Criteria::SCROLL_UP, self.mouse)),
                1 => out.push(Input::at(Criteria::SCROLL_DOWN, self.mouse)),
                _ => {}
            }
            return 6;
        }

        // Motion-flagged reports only move the pointer.
        if mask & 64 != 0 {
            return 6;
        }

        match mask & 3 {
            0 => {
                self.keyboard.press(Button::MouseLeft);
                out.push(Input::at(Criteria::MOUSE_LEFT_PRESSED, self.mouse));
            }
            1 => {
                self.keyboard.press(Button::MouseMiddle);
                out.push(Input::at(Criteria::MOUSE_MIDDLE_PRESSED, self.mouse));
            }
            2 => {
                self.keyboard.press(Button::MouseRight);
                out.push(Input::at(Criteria::MOUSE_RIGHT_PRESSED, self.mouse));
            }
            _ => {
                // Release: every held button that lets go becomes a click.
                for (button, clicked) in [
                    (Button::MouseLeft, Criteria::MOUSE_LEFT_CLICKED),
                    (Button::MouseMiddle, Criteria::MOUSE_MIDDLE_CLICKED),
                    (Button::MouseRight, Criteria::MOUSE_RIGHT_CLICKED),
                ] {
                    if self.keyboard.is_pressed(button) {
                        self.keyboard.release(button);
                        out.push(Input::at(clicked, self.mouse));
                    }
                }
            }
        }
        6
    }
}
