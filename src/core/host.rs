use crate::models::WidgetValue;

/// Widget calls the hosting UI framework exposes, one per trackable operation
/// kind.
///
/// On a rerun with unchanged arguments the host must return its own retained
/// value for the widget, not a fresh default.
pub trait WidgetHost {
    /// Button, checkbox, toggle or uploader. `true` when clicked, checked or a
    /// file is present.
    fn trigger(&mut self, label: &str) -> bool;

    fn select_one(&mut self, label: &str, options: &[&str]) -> Option<String>;

    fn select_many(&mut self, label: &str, options: &[&str]) -> Vec<String>;

    fn input_value(&mut self, label: &str) -> WidgetValue;

    /// Chat-style input; `Some` only on the run right after a submission.
    fn submission(&mut self, placeholder: &str) -> Option<String>;
}

impl<H: WidgetHost + ?Sized> WidgetHost for &mut H {
    fn trigger(&mut self, label: &str) -> bool {
        (**self).trigger(label)
    }

    fn select_one(&mut self, label: &str, options: &[&str]) -> Option<String> {
        (**self).select_one(label, options)
    }

    fn select_many(&mut self, label: &str, options: &[&str]) -> Vec<String> {
        (**self).select_many(label, options)
    }

    fn input_value(&mut self, label: &str) -> WidgetValue {
        (**self).input_value(label)
    }

    fn submission(&mut self, placeholder: &str) -> Option<String> {
        (**self).submission(placeholder)
    }
}
