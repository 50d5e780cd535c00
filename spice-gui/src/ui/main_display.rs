//! # Main Display Module
//!
//! Layout of the tuner window: the readout line, the status line, the
//! spectrogram panel and the staff panel, plus a small sidebar of toggles.

use iced::widget::{Space, button, column, container, row, text};
use iced::{Alignment, Element, Font, Length};

use super::{spectrogram, staff};

/// Sidebar toggles: label and the message each one sends.
const TOOL_BUTTONS: &[(&str, crate::Message)] = &[
    ("Spectrogram", crate::Message::ToggleSpectrogram),
    ("Staff", crate::Message::ToggleStaff),
];

/// Creates the complete main application view
pub fn create_main_view(
    data: &crate::AppDisplayData,
    worker_running: bool,
) -> Element<'_, crate::Message> {
    let title = text("SPICE Tuner").size(28);

    let mut content = column![title, Space::with_height(10), create_readout(data)].spacing(10);

    let status = if data.status.is_empty() && !worker_running {
        "Analysis stopped"
    } else {
        data.status.as_str()
    };
    if !status.is_empty() {
        content = content.push(text(status.to_string()).size(16));
    }
    if let Some(panel) = create_spectrogram_panel(data) {
        content = content.push(panel);
    }
    if let Some(panel) = create_staff_panel(data) {
        content = content.push(panel);
    }

    let main_content = row![
        content.width(Length::Fill),
        Space::with_width(10),
        create_sidebar(),
    ]
    .align_y(Alignment::Start)
    .padding(20);

    container(main_content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Frequency, note name and confidence, in fixed-width columns.
fn create_readout(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    let field = |value: &str, width: f32| {
        container(text(value.to_string()).size(32).font(Font::MONOSPACE))
            .width(Length::Fixed(width))
    };

    row![
        field(&data.frequency, 160.0),
        field(&data.note_name, 100.0),
        field(&data.confidence, 120.0),
    ]
    .spacing(20)
    .align_y(Alignment::Center)
    .into()
}

fn create_spectrogram_panel(
    data: &crate::AppDisplayData,
) -> Option<Element<'_, crate::Message>> {
    if !data.spectrogram_visible {
        return None;
    }

    let panel = container(
        column![
            text("Spectrogram").size(18),
            spectrogram::Spectrogram::new(&data.columns, data.block_size).view(),
        ]
        .spacing(5),
    )
    .width(Length::Fill)
    .height(Length::Fixed(260.0));

    Some(panel.into())
}

fn create_staff_panel(data: &crate::AppDisplayData) -> Option<Element<'static, crate::Message>> {
    if !data.staff_visible {
        return None;
    }

    let panel = container(
        column![
            text("Notes").size(18),
            staff::StaffView::new(data.staff_notes.clone(), data.note_lifetime).view(),
        ]
        .spacing(5),
    )
    .width(Length::Fill);

    Some(panel.into())
}

fn create_sidebar() -> Element<'static, crate::Message> {
    let mut buttons = column![text("Tools").size(16)].spacing(10);
    for (label, message) in TOOL_BUTTONS {
        buttons = buttons.push(
            button(text(*label).size(14).width(Length::Fill))
                .width(Length::Fill)
                .on_press(message.clone()),
        );
    }

    container(buttons.padding(15))
        .width(Length::Fixed(180.0))
        .height(Length::Fill)
        .into()
}
