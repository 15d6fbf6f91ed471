//! Readable type names for descriptions.

/// `std::any::type_name` with every module path removed.
///
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
pub fn short_type_name<T: ?Sized>() -> String {
  shorten(std::any::type_name::<T>())
}

fn shorten(full: &str) -> String {
  let mut out = String::with_capacity(full.len());
  let mut segment_start = 0;
  let mut chars = full.chars().peekable();

  while let Some(c) = chars.next() {
    if c == ':' && chars.peek() == Some(&':') {
      chars.next();
      out.truncate(segment_start);
    } else if c.is_alphanumeric() || c == '_' {
      out.push(c);
    } else {
      out.push(c);
      segment_start = out.len();
    }
  }

  out
}
