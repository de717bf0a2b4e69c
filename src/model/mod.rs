pub mod doctype;
