pub mod fixture_reader;
pub mod sponsorship_writer;
