mod controller;
mod process;
