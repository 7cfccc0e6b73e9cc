// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Vertex list and playback strategy selection.
//!
//! With a hardware ring buffer the list is downloaded once and played by a
//! single trigger. Without one, playback is host driven: one position
//! command per vertex per repetition, which is slower and subject to host
//! scheduling jitter.

use crate::error::CapabilityError;

/// One vertex in engineering units.
pub type Vertex = (f64, f64);

/// How the current list will be played.
#[derive(Debug, Clone, PartialEq)]
pub enum Playback {
    Hardware,
    Software { repetitions: u32, vertices: Vec<Vertex> },
}

#[derive(Debug, Clone, Default)]
pub struct PolygonSequencer {
    vertices: Vec<Vertex>,
    repetitions: u32,
    ring_buffer: bool,
}

impl PolygonSequencer {
    pub fn new(ring_buffer: bool) -> Self {
        Self {
            vertices: Vec::new(),
            repetitions: 0,
            ring_buffer,
        }
    }

    pub fn uses_ring_buffer(&self) -> bool {
        self.ring_buffer
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    /// Set vertex `index`, growing the list with `(0, 0)` fillers if needed.
    pub fn add_vertex(&mut self, index: usize, x: f64, y: f64) {
        if index >= self.vertices.len() {
            self.vertices.resize(index + 1, (0.0, 0.0));
        }
        self.vertices[index] = (x, y);
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    /// Only meaningful for host-driven playback.
    pub fn set_repetitions(&mut self, repetitions: u32) -> Result<(), CapabilityError> {
        if self.ring_buffer {
            return Err(CapabilityError::unsupported(
                "polygon repetitions with hardware ring buffer",
            ));
        }
        self.repetitions = repetitions;
        Ok(())
    }

    /// Vertices to download before playback; empty without a ring buffer.
    pub fn load_plan(&self) -> &[Vertex] {
        if self.ring_buffer {
            &self.vertices
        } else {
            &[]
        }
    }

    pub fn playback(&self) -> Playback {
        if self.ring_buffer {
            Playback::Hardware
        } else {
            Playback::Software {
                repetitions: self.repetitions,
                vertices: self.vertices.clone(),
            }
        }
    }
}
