//! # Spectrogram Widget
//!
//! Scrolling semitone spectrogram. The newest column sits at the right edge
//! and older columns move left by one block per audio callback. Confident
//! model pitches are drawn as red blocks over the columns they cover.

use iced::widget::canvas::{self, Geometry};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};
use spice_core::spectrogram::{Rgba, SpectrogramColumn};
use std::collections::VecDeque;

/// Spectrogram widget over the recent column history (newest first).
pub struct Spectrogram<'a> {
    columns: &'a VecDeque<SpectrogramColumn>,
    block_size: f32,
}

impl<'a> Spectrogram<'a> {
    pub fn new(columns: &'a VecDeque<SpectrogramColumn>, block_size: f32) -> Self {
        Self {
            columns,
            block_size: block_size.max(1.0),
        }
    }

    pub fn view(self) -> Element<'a, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fill),
        )
        .into()
    }

    /// Left edge of the column `age` callbacks old.
    fn column_x(&self, width: f32, age: usize) -> f32 {
        width - self.block_size * (age as f32 + 1.0)
    }
}

fn to_color(color: Rgba) -> Color {
    Color::from_rgba8(color.r, color.g, color.b, color.a)
}

impl<Message> canvas::Program<Message> for Spectrogram<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        if !bounds.width.is_finite() || !bounds.height.is_finite() {
            return vec![frame.into_geometry()];
        }
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), Color::WHITE);

        let visible = (bounds.width / self.block_size).ceil() as usize + 1;
        let rows = self
            .columns
            .front()
            .map_or(1, |column| column.cells.len().max(1));
        let block = Size::new(self.block_size, (bounds.height / rows as f32).max(1.0));
        let y_of = |height: f32| bounds.height - (height * bounds.height).round() - block.height;

        for (age, column) in self.columns.iter().take(visible).enumerate() {
            let x = self.column_x(bounds.width, age);
            for cell in &column.cells {
                frame.fill_rectangle(Point::new(x, y_of(cell.height)), block, to_color(cell.color));
            }
        }

        // Marks reach back over older columns, so they go on top of every cell.
        for (age, column) in self.columns.iter().take(visible).enumerate() {
            let right = self.column_x(bounds.width, age) + self.block_size;
            for mark in &column.marks {
                let x = right - self.block_size * mark.blocks_back;
                frame.fill_rectangle(Point::new(x, y_of(mark.height)), block, to_color(mark.color));
            }
        }

        vec![frame.into_geometry()]
    }
}
