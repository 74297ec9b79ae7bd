pub mod ogxbox;
