mod common;
mod datasets;
mod jobs;
